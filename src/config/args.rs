//! Command-line flags.
//!
//! Flags are layered over the optional TOML file, so anything given on the
//! command line wins.

use std::path::PathBuf;
use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{LogFormat, ProxyConfig, TlsConfig};

#[derive(Debug, Default, Parser)]
#[command(name = "intercept-proxy")]
#[command(about = "TLS-capable intercepting proxy that relays to a single target site", long_about = None)]
pub struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// The website requests are relayed to.
    #[arg(long)]
    pub target: Option<String>,

    /// Address and port to run the proxy on. Format address:port.
    #[arg(long)]
    pub address: Option<String>,

    /// Optional upstream SOCKS5 proxy.
    #[arg(long)]
    pub proxy: Option<String>,

    /// URL of a JavaScript file injected into HTML responses.
    #[arg(long = "inject-js")]
    pub inject_js: Option<String>,

    /// Listen without TLS.
    #[arg(long)]
    pub insecure: bool,

    /// Path to the PEM encoded certificate.
    #[arg(long)]
    pub cert: Option<String>,

    /// Path to the PEM encoded private key.
    #[arg(long = "private-key")]
    pub private_key: Option<String>,

    /// Serve Prometheus metrics.
    #[arg(long = "with-metrics")]
    pub with_metrics: bool,

    /// Address of the metrics endpoint.
    #[arg(long = "metrics-address")]
    pub metrics_address: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Log format.
    #[arg(long = "log-format", value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,
}

impl Args {
    /// Build the layered configuration: defaults, then the file, then flags.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(target) = self.target {
            config.target.url = target;
        }
        if let Some(address) = self.address {
            config.listener.bind_address = address;
        }
        if let Some(proxy) = self.proxy {
            config.upstream.socks5_proxy = Some(proxy);
        }
        if let Some(script) = self.inject_js {
            config.transform.inject_script = Some(script);
        }
        if self.insecure {
            config.listener.insecure = true;
        }
        if self.cert.is_some() || self.private_key.is_some() {
            let existing = config.listener.tls.take();
            let (cert, key) = existing
                .map(|tls| (tls.cert_path, tls.key_path))
                .unwrap_or_default();
            config.listener.tls = Some(TlsConfig {
                cert_path: self.cert.unwrap_or(cert),
                key_path: self.private_key.unwrap_or(key),
            });
        }
        if self.with_metrics {
            config.observability.metrics_enabled = true;
        }
        if let Some(address) = self.metrics_address {
            config.observability.metrics_address = address;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        config
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format {other:?} (expected pretty or json)")),
    }
}
