//! # Distribution bus for finished results.
//!
//! [`Bus`] fans every published [`OperationResult`] out to all subscribers.
//! Each subscriber owns a dedicated unbounded queue, so a slow listener never
//! makes another one miss a result and nothing is ever skipped for lag.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Subscribers (many):
//!   worker (run_async) ──┐            ┌──► [queue L0] ──► listener 0 delivery task
//!   worker (run_async) ──┼──► Bus ────┼──► [queue L1] ──► listener 1 delivery task
//!   caller (run_sync)  ──┘            └──► [queue LN] ──► listener N delivery task
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on a subscriber.
//! - **Exactly once**: each live subscriber receives each published result once.
//! - **Per-subscriber FIFO**: a subscriber sees results in publish order.
//! - **No persistence**: a result published before a subscriber exists is not replayed.
//! - **Self-pruning**: queues whose receiver was dropped are removed on the next publish.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::result::OperationResult;

type Subscriber = mpsc::UnboundedSender<Arc<OperationResult>>;

/// Fan-out channel for finished results.
///
/// Cheap to clone; clones share the subscriber list.
#[derive(Clone, Default)]
pub struct Bus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Bus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a result to every live subscriber.
    ///
    /// Returns the number of subscribers the result was queued for.
    pub fn publish(&self, result: Arc<OperationResult>) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(Arc::clone(&result)).is_ok());
        tracing::trace!(
            launch = %result.id(),
            receivers = subscribers.len(),
            "result published"
        );
        subscribers.len()
    }

    /// Creates a new receiver that observes results published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Arc<OperationResult>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of subscribers currently registered (dropped ones included until the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
