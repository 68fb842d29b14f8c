//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, one task per connection)
//!     → handler.rs (parse, then drive the exchange)
//!     → request.rs (re-address to the target, sanitize headers)
//!     → client.rs (dispatch upstream, optionally via SOCKS5)
//!     → [transform chain]
//!     → response.rs (frame the reply)
//!     → Write back to client, then hand the transaction to the sink
//! ```

pub mod client;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use client::{DispatchError, UpstreamClient};
pub use handler::{BuildError, ConnectionOutcome, ExchangeError, ProxyContext};
pub use request::{RewriteError, TargetOrigin};
pub use server::HttpServer;
