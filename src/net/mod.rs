//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → tls.rs (TLS handshake unless insecure)
//!     → connection.rs (id, lifecycle tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - No admission control: every accepted connection gets its own task
//! - Accept and handshake errors end only that connection
//! - TLS is terminated transparently; the HTTP layer sees a byte stream

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accepted, ClientStream, Listener, ListenerError};
