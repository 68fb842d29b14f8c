//! Upstream dispatch.
//!
//! # Responsibilities
//! - Build the shared upstream client once at startup
//! - Tunnel every upstream connection through SOCKS5 when configured
//! - Execute a rewritten request and buffer the response
//!
//! # Design Decisions
//! - A single overall timeout bounds each round trip
//! - No retries: a failed dispatch ends the exchange
//! - gzip is negotiated and decoded by the client itself

use std::time::{Duration, Instant};
use axum::http::{Request, Response};
use bytes::Bytes;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::observability::metrics;

/// Errors building the client or executing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid SOCKS5 proxy {address:?}: {source}")]
    InvalidProxy {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build upstream client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read upstream response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// HTTP client shared by every connection handler.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, DispatchError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let redirects = if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirects)
            .gzip(true);

        if let Some(address) = &config.socks5_proxy {
            let proxy_url = socks5_url(address);
            let proxy = reqwest::Proxy::all(&proxy_url).map_err(|source| {
                DispatchError::InvalidProxy {
                    address: address.clone(),
                    source,
                }
            })?;
            builder = builder.proxy(proxy);
            tracing::info!(proxy = %proxy_url, "Upstream connections tunnelled through SOCKS5");
        }

        let client = builder.build().map_err(DispatchError::Build)?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `request` and return the response with its body fully read.
    pub async fn dispatch(&self, request: &Request<Bytes>) -> Result<Response<Bytes>, DispatchError> {
        let start = Instant::now();

        let mut outbound = self
            .client
            .request(request.method().clone(), request.uri().to_string())
            .headers(request.headers().clone());
        if !request.body().is_empty() {
            outbound = outbound.body(request.body().clone());
        }

        let upstream = outbound.send().await.map_err(|e| self.classify(e))?;

        let status = upstream.status();
        let version = upstream.version();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Timeout(self.timeout)
            } else {
                DispatchError::Body(e)
            }
        })?;
        metrics::record_upstream(start);

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn classify(&self, error: reqwest::Error) -> DispatchError {
        if error.is_timeout() {
            DispatchError::Timeout(self.timeout)
        } else {
            DispatchError::Transport(error)
        }
    }
}

/// Accept both `host:port` and full `socks5://` style URLs.
fn socks5_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("socks5://{address}")
    }
}
