//! Intercepting proxy.
//!
//! ```text
//!     Client ──▶ net::listener (plain or TLS)
//!                   │
//!                   ▼
//!              http::handler ──▶ http::request (re-address, sanitize)
//!                   │                 │
//!                   │                 ▼
//!                   │            http::client ──▶ Target site
//!                   │                 │
//!                   │                 ▼
//!                   │            transform chain (inject, strip, cookies)
//!                   ▼
//!     Client ◀── write-back ──▶ capture::sink (one consumer)
//! ```

use clap::Parser;

use intercept_proxy::config::{validate_config, Args, ConfigError};
use intercept_proxy::lifecycle::shutdown_signal;
use intercept_proxy::net::Listener;
use intercept_proxy::observability::{logging, metrics};
use intercept_proxy::{HttpServer, Shutdown, TracingLog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    logging::init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    );

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(target_url = %config.target.url, "Setting target to {}", config.target.url);
    if let Some(script) = &config.transform.inject_script {
        tracing::info!(script = %script, "Injecting script into HTML responses");
    }

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::from_config(&config)?;
    let listener = Listener::bind(&config.listener).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        "Listening on: {}://{}",
        config.listener.scheme(),
        local_addr
    );

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    let log = TracingLog::new(config.capture.log_request_body);
    server.run(listener, log, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
