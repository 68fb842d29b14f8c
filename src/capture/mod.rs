//! Transaction capture subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler (after successful write-back)
//!     → TransactionSender (bounded mpsc)
//!     → sink.rs (single consumer task)
//!     → TransactionLog (tracing target "transactions", or in-memory)
//! ```
//!
//! # Design Decisions
//! - Exactly one consumer; handlers never share mutable log state
//! - Aborted exchanges never produce a transaction
//! - The sink exits once every sender is gone, which is how shutdown drains it

pub mod sink;
pub mod transaction;

pub use sink::{TracingLog, TransactionLog, TransactionSender, TransactionSink};
pub use transaction::Transaction;
