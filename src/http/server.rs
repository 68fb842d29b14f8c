//! Accept loop and connection dispatch.
//!
//! # Responsibilities
//! - Accept connections until shutdown
//! - Hand each connection to its own task (TLS handshake included)
//! - Own the transaction sink task
//! - Drain in-flight connections and the sink on shutdown

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::capture::{TransactionLog, TransactionSender, TransactionSink};
use crate::config::{CaptureConfig, ProxyConfig};
use crate::http::handler::{handle_connection, BuildError, ProxyContext};
use crate::net::{Accepted, ClientStream, ConnectionTracker, Listener};
use crate::observability::metrics;

/// The intercepting proxy server.
pub struct HttpServer {
    context: Arc<ProxyContext>,
    capture: CaptureConfig,
    drain_timeout: Duration,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(context: ProxyContext, capture: CaptureConfig, drain_timeout: Duration) -> Self {
        Self {
            context: Arc::new(context),
            capture,
            drain_timeout,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the shared context from a validated configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, BuildError> {
        let context = ProxyContext::from_config(config)?;
        Ok(Self::new(
            context,
            config.capture.clone(),
            Duration::from_secs(config.listener.drain_timeout_secs),
        ))
    }

    /// Connections currently being handled.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Serve until `shutdown` fires, then drain and return the log.
    ///
    /// Accept and handshake failures are logged and the loop continues.
    pub async fn run<L: TransactionLog>(
        self,
        listener: Listener,
        log: L,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<L, std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = listener.is_tls(), "Proxy server starting");

        let (transactions, sink) = TransactionSink::channel(self.capture.channel_capacity, log);
        let sink = tokio::spawn(sink.run());

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => self.spawn_connection(accepted, transactions.clone()),
                    Err(e) => {
                        metrics::accept_error();
                        tracing::warn!(error = %e, "Error when accepting request");
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        drop(transactions);

        if !self.tracker.wait_idle(self.drain_timeout).await {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Drain timeout reached with connections still open"
            );
        }

        // Handlers still running keep their senders; the sink ends with the last one.
        let log = match tokio::time::timeout(self.drain_timeout, sink).await {
            Ok(Ok(log)) => log,
            Ok(Err(e)) => return Err(std::io::Error::other(e)),
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "transaction sink did not drain before the deadline",
                ))
            }
        };

        tracing::info!("Proxy server stopped");
        Ok(log)
    }

    fn spawn_connection(&self, accepted: Accepted, transactions: TransactionSender) {
        metrics::connection_accepted();
        let guard = self.tracker.track();
        let id = guard.id();
        let peer = accepted.peer_addr();
        let context = Arc::clone(&self.context);

        let span = tracing::info_span!("connection", connection_id = %id, peer = %peer);
        tokio::spawn(
            async move {
                let _guard = guard;
                let stream = match accepted.establish().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        metrics::accept_error();
                        tracing::warn!(error = %e, "Error when accepting request");
                        return;
                    }
                };

                let outcome = match stream {
                    ClientStream::Plain(stream) => {
                        handle_connection(stream, peer, id, context, transactions).await
                    }
                    ClientStream::Tls(stream) => {
                        handle_connection(stream, peer, id, context, transactions).await
                    }
                };
                tracing::debug!(?outcome, "Connection finished");
            }
            .instrument(span),
        );
    }
}
