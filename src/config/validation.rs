//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the target and injected script are absolute URLs
//! - Check that TLS material is configured unless running insecure
//! - Validate value ranges (timeouts > 0, capacities >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is bound

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address is required")]
    MissingBindAddress,

    #[error("target.url is required")]
    MissingTarget,

    #[error("target.url {url:?} is invalid: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("TLS certificate and private key are required unless running insecure")]
    MissingTls,

    #[error("transform.inject_script {url:?} is invalid: {reason}")]
    InvalidInjectScript { url: String, reason: String },

    #[error("upstream.socks5_proxy must not be empty")]
    EmptySocksProxy,

    #[error("upstream.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("capture.channel_capacity must be at least 1")]
    ZeroChannelCapacity,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a fully layered configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::MissingBindAddress);
    }

    if config.target.url.trim().is_empty() {
        errors.push(ValidationError::MissingTarget);
    } else if let Err(reason) = check_absolute_url(&config.target.url) {
        errors.push(ValidationError::InvalidTarget {
            url: config.target.url.clone(),
            reason,
        });
    }

    if !config.listener.insecure {
        let complete = config
            .listener
            .tls
            .as_ref()
            .is_some_and(|tls| !tls.cert_path.is_empty() && !tls.key_path.is_empty());
        if !complete {
            errors.push(ValidationError::MissingTls);
        }
    }

    if let Some(script) = &config.transform.inject_script {
        if let Err(reason) = check_absolute_url(script) {
            errors.push(ValidationError::InvalidInjectScript {
                url: script.clone(),
                reason,
            });
        }
    }

    if let Some(socks) = &config.upstream.socks5_proxy {
        if socks.trim().is_empty() {
            errors.push(ValidationError::EmptySocksProxy);
        }
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.capture.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_absolute_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}")),
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err("missing host".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.target.url = "https://good.example".into();
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
        });
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_insecure_needs_no_tls() {
        let mut config = valid_config();
        config.listener.tls = None;
        config.listener.insecure = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = String::new();
        config.upstream.timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingBindAddress));
        assert!(errors.contains(&ValidationError::MissingTarget));
        assert!(errors.contains(&ValidationError::MissingTls));
        assert!(errors.contains(&ValidationError::ZeroTimeout));
    }

    #[test]
    fn test_target_needs_scheme_and_host() {
        let mut config = valid_config();
        config.target.url = "good.example/path".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidTarget { .. }));

        config.target.url = "ftp://good.example".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidTarget { .. }));
    }

    #[test]
    fn test_inject_script_must_be_absolute() {
        let mut config = valid_config();
        config.transform.inject_script = Some("/static/x.js".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidInjectScript { .. }));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = valid_config();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidMetricsAddress(_)));
    }
}
