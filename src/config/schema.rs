//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the intercepting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// The origin every request is forwarded to.
    pub target: TargetConfig,

    /// Upstream HTTP client settings.
    pub upstream: UpstreamConfig,

    /// Response transformer chain settings.
    pub transform: TransformConfig,

    /// Transaction capture settings.
    pub capture: CaptureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443"). Host names are resolved.
    pub bind_address: String,

    /// Listen without TLS.
    pub insecure: bool,

    /// TLS identity, required unless `insecure` is set.
    pub tls: Option<TlsConfig>,

    /// How long in-flight connections may run after shutdown is requested.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "localhost:8080".to_string(),
            insecure: false,
            tls: None,
            drain_timeout_secs: 10,
        }
    }
}

impl ListenerConfig {
    /// Scheme clients use to reach the listener.
    pub fn scheme(&self) -> &'static str {
        if self.insecure {
            "http"
        } else {
            "https"
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Target origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TargetConfig {
    /// Absolute URL of the site being relayed. Only scheme and host are used.
    pub url: String,
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Optional SOCKS5 proxy ("host:port" or "socks5://host:port").
    pub socks5_proxy: Option<String>,

    /// Overall per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Follow redirects issued by the target.
    pub follow_redirects: bool,

    /// Largest inbound request body that is relayed.
    pub max_request_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            socks5_proxy: None,
            timeout_secs: 20,
            follow_redirects: true,
            max_request_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Response transformer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TransformConfig {
    /// Absolute URL of a script injected into every HTML document.
    pub inject_script: Option<String>,

    /// Response headers removed before write-back.
    pub strip_response_headers: Vec<String>,

    /// Domain written into the `Domain=` attribute of `Set-Cookie` headers.
    pub cookie_domain: Option<String>,
}

/// Transaction capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capacity of the hand-off channel to the transaction sink.
    pub channel_capacity: usize,

    /// Include request bodies in transaction dumps.
    pub log_request_body: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
            log_request_body: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:6060".to_string(),
        }
    }
}
