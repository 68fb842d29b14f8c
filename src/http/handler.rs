//! Per-connection exchange handling.
//!
//! # State Machine
//! ```text
//! Accepted → RequestParsed → RequestRewritten → Dispatched
//!          → Transformed → WrittenBack → Logged
//! ```
//! Every state before `WrittenBack` can abort. An abort is logged and the
//! connection is closed without a synthesized reply. Only an exchange that
//! reaches `WrittenBack` becomes a [`Transaction`].
//!
//! # Design Decisions
//! - One request per connection: keep-alive is disabled
//! - The request body is read fully before rewriting, bounded by a size limit
//! - Transformer failures never abort; see [`TransformerChain::apply`]

use std::error::Error as _;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::capture::{Transaction, TransactionSender};
use crate::config::ProxyConfig;
use crate::http::client::{DispatchError, UpstreamClient};
use crate::http::request::{rewrite_request, RewriteError, TargetOrigin};
use crate::http::response::prepare_for_client;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::transform::{TransformError, TransformerChain};

/// Reasons an exchange ended before a response was produced.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to read request body: {0}")]
    Parse(#[source] axum::Error),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ExchangeError {
    /// Label of the state the exchange aborted in.
    pub fn stage(&self) -> &'static str {
        match self {
            ExchangeError::Parse(_) => "parse",
            ExchangeError::Rewrite(_) => "rewrite",
            ExchangeError::Dispatch(_) => "dispatch",
        }
    }
}

/// Startup failures building the shared context.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid target: {0}")]
    Target(#[source] RewriteError),

    #[error("invalid upstream settings: {0}")]
    Upstream(#[source] DispatchError),

    #[error("invalid transformer settings: {0}")]
    Transformer(#[source] TransformError),
}

/// Read-only state shared by every connection handler.
pub struct ProxyContext {
    origin: TargetOrigin,
    upstream: UpstreamClient,
    transformers: TransformerChain,
    max_request_body: usize,
}

impl ProxyContext {
    pub fn new(
        origin: TargetOrigin,
        upstream: UpstreamClient,
        transformers: TransformerChain,
        max_request_body: usize,
    ) -> Self {
        Self {
            origin,
            upstream,
            transformers,
            max_request_body,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, BuildError> {
        let origin = TargetOrigin::parse(&config.target.url).map_err(BuildError::Target)?;
        let upstream = UpstreamClient::new(&config.upstream).map_err(BuildError::Upstream)?;
        let transformers =
            TransformerChain::from_config(&config.transform).map_err(BuildError::Transformer)?;

        tracing::debug!(
            target_origin = %origin,
            transformers = ?transformers.names(),
            "Proxy context built"
        );

        Ok(Self::new(
            origin,
            upstream,
            transformers,
            config.upstream.max_request_body_bytes,
        ))
    }

    pub fn origin(&self) -> &TargetOrigin {
        &self.origin
    }

    pub fn transformers(&self) -> &TransformerChain {
        &self.transformers
    }

    /// Rewrite, dispatch and transform one parsed request.
    ///
    /// Returns the outbound request alongside the final response so both can
    /// be recorded once the response has been written back.
    pub async fn exchange(
        &self,
        inbound: Request<Bytes>,
    ) -> Result<(Request<Bytes>, Response<Bytes>), ExchangeError> {
        let outbound = rewrite_request(inbound, &self.origin)?;
        let mut response = self.upstream.dispatch(&outbound).await?;

        let failures = self.transformers.apply(&mut response);
        if failures > 0 {
            tracing::debug!(failures, "Response written with partial transformation");
        }

        Ok((outbound, response))
    }
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The response was written back and handed to the sink.
    Logged,
    /// The client closed before sending a request.
    Idle,
    /// The exchange stopped in the named state.
    Aborted(&'static str),
}

type Completed = Arc<Mutex<Option<(Request<Bytes>, Response<Bytes>)>>>;

/// Serve exactly one exchange on `stream`, then close it.
///
/// A transaction is sent to the sink only if the response was written back
/// in full. Sending waits for room in the channel.
pub async fn handle_connection<S>(
    stream: S,
    peer: SocketAddr,
    id: ConnectionId,
    context: Arc<ProxyContext>,
    transactions: TransactionSender,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let completed: Completed = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&completed);
    let service = service_fn(move |request: Request<Incoming>| {
        let context = Arc::clone(&context);
        let slot = Arc::clone(&slot);
        async move { serve_request(request, &context, &slot).await }
    });

    let served = http1::Builder::new()
        .keep_alive(false)
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), service)
        .await;

    let exchange = completed.lock().ok().and_then(|mut slot| slot.take());

    match (served, exchange) {
        (Ok(()), Some((request, response))) => {
            let transaction = Transaction::new(id, peer, request, response);
            if transactions.send(transaction).await.is_err() {
                tracing::warn!("Transaction sink closed; transaction dropped");
            }
            ConnectionOutcome::Logged
        }
        (Ok(()), None) => {
            tracing::debug!("Connection closed before a request arrived");
            ConnectionOutcome::Idle
        }
        // The service already logged why it gave up.
        (Err(e), _) if e.is_user() => {
            let stage = e
                .source()
                .and_then(|cause| cause.downcast_ref::<ExchangeError>())
                .map_or("parse", ExchangeError::stage);
            ConnectionOutcome::Aborted(stage)
        }
        (Err(e), Some(_)) => {
            metrics::record_abort("write");
            tracing::warn!(error = %e, "Error responding to client");
            ConnectionOutcome::Aborted("write")
        }
        (Err(e), None) => {
            metrics::record_abort("parse");
            tracing::warn!(error = %e, "Error parsing request");
            ConnectionOutcome::Aborted("parse")
        }
    }
}

const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);

async fn serve_request(
    request: Request<Incoming>,
    context: &ProxyContext,
    completed: &Mutex<Option<(Request<Bytes>, Response<Bytes>)>>,
) -> Result<Response<Body>, ExchangeError> {
    let head_request = request.method() == Method::HEAD;

    let result = async {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(Body::new(body), context.max_request_body)
            .await
            .map_err(ExchangeError::Parse)?;
        tracing::debug!(
            method = %parts.method,
            uri = %parts.uri,
            body_bytes = body.len(),
            "Request parsed"
        );
        context.exchange(Request::from_parts(parts, body)).await
    }
    .await;

    let (outbound, response) = match result {
        Ok(exchange) => exchange,
        Err(e) => {
            metrics::record_abort(e.stage());
            match &e {
                ExchangeError::Parse(_) => tracing::warn!(error = %e, "Error parsing request"),
                ExchangeError::Rewrite(_) => tracing::warn!(error = %e, "Error cloning request"),
                ExchangeError::Dispatch(_) => tracing::warn!(error = %e, "Proxy error"),
            }
            return Err(e);
        }
    };

    let reply = prepare_for_client(&response, head_request);
    if let Ok(mut slot) = completed.lock() {
        *slot = Some((outbound, response));
    }
    Ok(reply)
}
