//! Intercepting proxy library.
//!
//! Relays every client request to a single target origin, rewrites the
//! response on the way back, and records each completed exchange.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod transform;

pub use capture::{TracingLog, Transaction, TransactionLog};
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
