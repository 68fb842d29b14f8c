//! Response transformer subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response (buffered)
//!     → inject.rs (script tag into <head>, CSP widened via csp.rs)
//!     → headers.rs (drop configured headers)
//!     → cookies.rs (rewrite Set-Cookie domains)
//!     → Write back to client
//! ```
//!
//! # Design Decisions
//! - Chain order is fixed when the chain is built and never changes
//! - A transformer failure is logged and the chain keeps going
//! - The response written back is whatever state the last transformer left

pub mod cookies;
pub mod csp;
pub mod headers;
pub mod inject;

use axum::http::header::InvalidHeaderValue;
use axum::http::Response;
use bytes::Bytes;
use lol_html::errors::RewritingError;
use thiserror::Error;

use crate::config::TransformConfig;
use crate::observability::metrics;

pub use cookies::CookieDomainRewriter;
pub use headers::StripHeaders;
pub use inject::ScriptInjector;

/// Errors reported by transformers. None of them abort the exchange.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("script URL {0:?} has no origin")]
    InvalidScriptUrl(String),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),

    #[error("failed to rewrite HTML document: {0}")]
    Html(#[from] RewritingError),
}

/// Something that mutates an upstream response in place before write-back.
///
/// Implementations report failure through the returned error and must leave
/// the response in a state that is still safe to send.
pub trait Transformer: Send + Sync {
    /// Short stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    fn transform(&self, response: &mut Response<Bytes>) -> Result<(), TransformError>;
}

/// Ordered list of transformers applied to every response.
///
/// An empty chain is the identity transform.
#[derive(Default)]
pub struct TransformerChain {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain described by the configuration.
    pub fn from_config(config: &TransformConfig) -> Result<Self, TransformError> {
        let mut chain = Self::new();
        if let Some(script) = &config.inject_script {
            chain.push(ScriptInjector::new(script.clone())?);
        }
        if !config.strip_response_headers.is_empty() {
            chain.push(StripHeaders::new(&config.strip_response_headers)?);
        }
        if let Some(domain) = &config.cookie_domain {
            chain.push(CookieDomainRewriter::new(domain.clone())?);
        }
        Ok(chain)
    }

    /// Append a transformer to the end of the chain.
    pub fn push(&mut self, transformer: impl Transformer + 'static) {
        self.transformers.push(Box::new(transformer));
    }

    /// Builder form of [`TransformerChain::push`].
    pub fn with(mut self, transformer: impl Transformer + 'static) -> Self {
        self.push(transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Names in application order.
    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Run every transformer in order. Returns the number that failed.
    pub fn apply(&self, response: &mut Response<Bytes>) -> usize {
        let mut failures = 0;
        for transformer in &self.transformers {
            if let Err(e) = transformer.transform(response) {
                failures += 1;
                metrics::record_transform_failure(transformer.name());
                tracing::warn!(
                    transformer = transformer.name(),
                    error = %e,
                    "Error transforming response"
                );
            }
        }
        failures
    }
}

impl std::fmt::Debug for TransformerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::{Arc, Mutex};

    /// Records the order transformers ran in.
    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Transformer for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn transform(&self, response: &mut Response<Bytes>) -> Result<(), TransformError> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                return Err(TransformError::InvalidHeaderName(self.name.to_string()));
            }
            response
                .headers_mut()
                .append("x-seen-by", HeaderValue::from_static(self.name));
            Ok(())
        }
    }

    fn recorder(name: &'static str, calls: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Recorder {
        Recorder { name, calls: calls.clone(), fail }
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = TransformerChain::new();
        let mut response = Response::new(Bytes::from_static(b"body"));
        assert_eq!(chain.apply(&mut response), 0);
        assert_eq!(response.body().as_ref(), b"body");
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_chain() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = TransformerChain::new()
            .with(recorder("first", &calls, false))
            .with(recorder("broken", &calls, true))
            .with(recorder("last", &calls, false));

        let mut response = Response::new(Bytes::new());
        assert_eq!(chain.apply(&mut response), 1);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "broken", "last"]);

        let seen: Vec<_> = response.headers().get_all("x-seen-by").iter().collect();
        assert_eq!(seen, vec!["first", "last"]);
    }

    #[test]
    fn test_from_config_order() {
        let config = TransformConfig {
            inject_script: Some("https://cdn.example/x.js".into()),
            strip_response_headers: vec!["strict-transport-security".into()],
            cookie_domain: Some("proxyhost".into()),
        };
        let chain = TransformerChain::from_config(&config).unwrap();
        assert_eq!(
            chain.names(),
            vec!["script_injector", "strip_headers", "cookie_domain"]
        );
    }

    #[test]
    fn test_from_default_config_is_empty() {
        let chain = TransformerChain::from_config(&TransformConfig::default()).unwrap();
        assert!(chain.is_empty());
    }
}
