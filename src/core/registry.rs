//! # Running-operation registry.
//!
//! Tracks every asynchronous launch that is scheduled and not yet finished, and
//! remembers which launches were cancelled.
//!
//! ## Architecture
//! ```text
//! Engine::run_async ──► schedule(id, op, token, spawn)   (one critical section)
//! worker finishes   ──► finished(id)                      (idempotent)
//! Listener::cancel  ──► cancel(id, may_interrupt)          ─► token.cancel()
//!                                                          ─► cancelled += id
//!                                                          ─► abort worker (optional)
//! Relay::cancel_all ──► cancel_all(may_interrupt)          ─► same, then clear table
//! Listener intake   ──► is_cancelled(id)                   (suppress late results)
//! ```
//!
//! ## Rules
//! - Scheduling the worker and inserting its entry happen under one lock, so a
//!   worker can never call `finished` before its own entry exists.
//! - All access goes through a single mutex (not per entry).
//! - The lock is never held across an `.await`.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::events::LaunchId;
use crate::operations::OperationRef;

/// Handle to a running launch.
struct Handle {
    /// Operation being executed.
    operation: OperationRef,
    /// Cancellation flag handed to the operation body.
    cancel: CancellationToken,
    /// Abort signal for the worker task.
    abort: AbortHandle,
}

impl Handle {
    fn cancel(&self, may_interrupt: bool) {
        self.cancel.cancel();
        if may_interrupt {
            self.abort.abort();
        }
    }
}

/// Record of cancelled launch ids, optionally bounded (oldest forgotten first).
struct CancelledSet {
    order: VecDeque<LaunchId>,
    ids: HashSet<LaunchId>,
    limit: Option<usize>,
}

impl CancelledSet {
    fn new(limit: Option<usize>) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            limit,
        }
    }

    fn insert(&mut self, id: LaunchId) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        if let Some(limit) = self.limit {
            while self.order.len() > limit {
                if let Some(old) = self.order.pop_front() {
                    self.ids.remove(&old);
                }
            }
        }
    }

    fn contains(&self, id: LaunchId) -> bool {
        self.ids.contains(&id)
    }
}

struct Tables {
    running: HashMap<LaunchId, Handle>,
    cancelled: CancelledSet,
}

/// Registry of running launches.
pub struct Registry {
    tables: Mutex<Tables>,
}

impl Registry {
    /// Creates an empty registry remembering at most `cancelled_limit` cancelled ids.
    pub(crate) fn new(cancelled_limit: Option<usize>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                running: HashMap::new(),
                cancelled: CancelledSet::new(cancelled_limit),
            }),
        }
    }

    /// Spawns the worker via `spawn` and records the launch, atomically.
    pub(crate) fn schedule(
        &self,
        id: LaunchId,
        operation: OperationRef,
        cancel: CancellationToken,
        spawn: impl FnOnce() -> AbortHandle,
    ) {
        let mut tables = self.tables.lock();
        let abort = spawn();
        tables.running.insert(
            id,
            Handle {
                operation,
                cancel,
                abort,
            },
        );
    }

    /// Removes a finished launch. No-op if it was already removed.
    pub(crate) fn finished(&self, id: LaunchId) {
        self.take_handle(id);
    }

    /// Cancels a running launch.
    ///
    /// Flags the operation's token, records the id as cancelled and, if
    /// `may_interrupt`, aborts the worker. Returns `false` if the launch is not
    /// running (already finished, already cancelled, or never existed).
    ///
    /// Skips the ownership check; clients cancel through their listener.
    pub(crate) fn cancel(&self, id: LaunchId, may_interrupt: bool) -> bool {
        let mut tables = self.tables.lock();
        let Some(handle) = tables.running.remove(&id) else {
            return false;
        };
        tables.cancelled.insert(id);
        handle.cancel(may_interrupt);
        drop(tables);

        tracing::debug!(
            launch = %id,
            operation = handle.operation.name(),
            may_interrupt,
            "launch cancelled"
        );
        true
    }

    /// Cancels every running launch, then clears the table.
    ///
    /// Returns the cancelled ids, sorted.
    pub(crate) fn cancel_all(&self, may_interrupt: bool) -> Vec<LaunchId> {
        let mut tables = self.tables.lock();
        let handles: Vec<(LaunchId, Handle)> = tables.running.drain().collect();
        for (id, handle) in &handles {
            tables.cancelled.insert(*id);
            handle.cancel(may_interrupt);
        }
        drop(tables);

        let mut ids: Vec<LaunchId> = handles.into_iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        if !ids.is_empty() {
            tracing::debug!(count = ids.len(), may_interrupt, "all launches cancelled");
        }
        ids
    }

    /// True while the launch is scheduled and neither finished nor cancelled.
    pub fn is_running(&self, id: LaunchId) -> bool {
        self.tables.lock().running.contains_key(&id)
    }

    /// True if the launch was cancelled (within the retention window).
    pub fn is_cancelled(&self, id: LaunchId) -> bool {
        self.tables.lock().cancelled.contains(id)
    }

    /// Returns sorted list of running launch ids.
    pub fn running(&self) -> Vec<LaunchId> {
        let tables = self.tables.lock();
        let mut ids: Vec<LaunchId> = tables.running.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of running launches.
    pub fn len(&self) -> usize {
        self.tables.lock().running.len()
    }

    /// Returns true if nothing is running.
    pub fn is_empty(&self) -> bool {
        self.tables.lock().running.is_empty()
    }

    /// Atomically remove handle from the table.
    fn take_handle(&self, id: LaunchId) -> Option<Handle> {
        self.tables.lock().running.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinHandle;

    use super::*;
    use crate::error::OperationError;
    use crate::operations::OperationFn;

    fn op() -> OperationRef {
        Arc::new(OperationFn::new("idle", |_ctx: CancellationToken| async {
            Ok::<_, OperationError>(())
        }))
    }

    fn schedule_parked(reg: &Registry, id: u64) -> (CancellationToken, JoinHandle<()>) {
        let token = CancellationToken::new();
        let join = tokio::spawn(std::future::pending::<()>());
        let abort = join.abort_handle();
        reg.schedule(LaunchId::new(id), op(), token.clone(), || abort);
        (token, join)
    }

    #[tokio::test]
    async fn cancel_succeeds_once() {
        let reg = Registry::new(None);
        let (token, join) = schedule_parked(&reg, 1);
        let id = LaunchId::new(1);

        assert!(reg.is_running(id));
        assert!(reg.cancel(id, true));
        assert!(token.is_cancelled());
        assert!(reg.is_cancelled(id));
        assert!(!reg.is_running(id));
        assert!(join.await.unwrap_err().is_cancelled());

        assert!(!reg.cancel(id, true));
    }

    #[tokio::test]
    async fn cancel_without_interrupt_leaves_worker_running() {
        let reg = Registry::new(None);
        let (token, join) = schedule_parked(&reg, 1);

        assert!(reg.cancel(LaunchId::new(1), false));
        assert!(token.is_cancelled());
        assert!(!join.is_finished());
        join.abort();
    }

    #[tokio::test]
    async fn unknown_and_finished_ids_are_not_cancelled() {
        let reg = Registry::new(None);
        let (_token, join) = schedule_parked(&reg, 1);

        assert!(!reg.cancel(LaunchId::new(99), true));
        assert!(!reg.is_cancelled(LaunchId::new(99)));

        reg.finished(LaunchId::new(1));
        reg.finished(LaunchId::new(1));
        assert!(reg.is_empty());
        assert!(!reg.cancel(LaunchId::new(1), true));
        assert!(!reg.is_cancelled(LaunchId::new(1)));
        join.abort();
    }

    #[tokio::test]
    async fn cancel_all_clears_table_and_records_ids() {
        let reg = Registry::new(None);
        let parked: Vec<_> = (1..=3).map(|i| schedule_parked(&reg, i)).collect();
        assert_eq!(reg.running(), vec![LaunchId::new(1), LaunchId::new(2), LaunchId::new(3)]);

        assert_eq!(
            reg.cancel_all(true),
            vec![LaunchId::new(1), LaunchId::new(2), LaunchId::new(3)]
        );
        assert_eq!(reg.len(), 0);
        for (i, (token, join)) in parked.into_iter().enumerate() {
            assert!(token.is_cancelled());
            assert!(reg.is_cancelled(LaunchId::new(i as u64 + 1)));
            assert!(join.await.unwrap_err().is_cancelled());
        }
        assert!(reg.cancel_all(true).is_empty());
    }

    #[tokio::test]
    async fn cancelled_record_respects_retention() {
        let reg = Registry::new(Some(2));
        for i in 1..=3 {
            let (_token, _join) = schedule_parked(&reg, i);
            assert!(reg.cancel(LaunchId::new(i), true));
        }
        assert!(!reg.is_cancelled(LaunchId::new(1)));
        assert!(reg.is_cancelled(LaunchId::new(2)));
        assert!(reg.is_cancelled(LaunchId::new(3)));
    }
}
