//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (connections, aborts, transformer failures, latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `intercept_connections_total` (counter): accepted connections
//! - `intercept_accept_errors_total` (counter): accept/handshake failures
//! - `intercept_active_connections` (gauge): connections being handled
//! - `intercept_aborts_total` (counter): aborted exchanges by stage
//! - `intercept_transform_failures_total` (counter): soft failures by transformer
//! - `intercept_upstream_duration_seconds` (histogram): upstream round trips
//! - `intercept_transactions_total` (counter): transactions handed to the sink
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (stage and transformer names only)

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and serve it on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn connection_accepted() {
    counter!("intercept_connections_total").increment(1);
}

pub fn accept_error() {
    counter!("intercept_accept_errors_total").increment(1);
}

pub fn connection_opened() {
    gauge!("intercept_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("intercept_active_connections").decrement(1.0);
}

/// Record an exchange that ended before write-back completed.
pub fn record_abort(stage: &'static str) {
    counter!("intercept_aborts_total", "stage" => stage).increment(1);
}

pub fn record_transform_failure(transformer: &'static str) {
    counter!("intercept_transform_failures_total", "transformer" => transformer).increment(1);
}

pub fn record_upstream(start: Instant) {
    histogram!("intercept_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_transaction() {
    counter!("intercept_transactions_total").increment(1);
}
