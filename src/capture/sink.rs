//! The single consumer of completed transactions.
//!
//! Connection handlers hold a [`TransactionSender`]; the sink task owns the
//! receiver and hands transactions to a [`TransactionLog`] one at a time, in
//! the order they arrive.

use tokio::sync::mpsc;

use crate::capture::transaction::{dump_request, dump_response_head, Transaction};
use crate::observability::metrics;

/// Producer handle given to every connection handler.
///
/// Sending waits while the channel is full, so a slow log slows the
/// handlers down instead of buffering without bound.
pub type TransactionSender = mpsc::Sender<Transaction>;

/// Destination for completed transactions.
///
/// Only the sink task calls `record`, so implementations need no locking.
pub trait TransactionLog: Send + 'static {
    fn record(&mut self, transaction: Transaction);
}

/// Writes each transaction to the `transactions` tracing target.
#[derive(Debug, Clone)]
pub struct TracingLog {
    include_request_body: bool,
}

impl TracingLog {
    pub fn new(include_request_body: bool) -> Self {
        Self { include_request_body }
    }
}

impl TransactionLog for TracingLog {
    fn record(&mut self, transaction: Transaction) {
        tracing::info!(
            target: "transactions",
            connection_id = %transaction.connection_id(),
            peer = %transaction.peer(),
            method = %transaction.request().method(),
            uri = %transaction.request().uri(),
            status = transaction.response().status().as_u16(),
            response_bytes = transaction.response().body().len(),
            "{}\n{}",
            dump_request(transaction.request(), self.include_request_body),
            dump_response_head(transaction.response()),
        );
    }
}

/// Keeps every transaction in memory, in arrival order.
impl TransactionLog for Vec<Transaction> {
    fn record(&mut self, transaction: Transaction) {
        self.push(transaction);
    }
}

/// Consumer side of the transaction channel.
pub struct TransactionSink<L> {
    receiver: mpsc::Receiver<Transaction>,
    log: L,
}

impl<L: TransactionLog> TransactionSink<L> {
    /// Create the channel. `capacity` is clamped to at least one slot.
    pub fn channel(capacity: usize, log: L) -> (TransactionSender, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver, log })
    }

    /// Record transactions until every sender has been dropped, then return
    /// the log.
    pub async fn run(mut self) -> L {
        while let Some(transaction) = self.receiver.recv().await {
            tracing::trace!(connection_id = %transaction.connection_id(), "Transaction received");
            metrics::record_transaction();
            self.log.record(transaction);
        }
        tracing::debug!("Transaction sink drained");
        self.log
    }
}
