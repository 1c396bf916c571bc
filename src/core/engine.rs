//! # Execution engine: launch ids, workers, publication.
//!
//! The [`Engine`] turns an [`Operation`] into a launch:
//!
//! ```text
//! run_async(op, broadcast):
//!   id = next_id()
//!   pending = PendingResult(id, op, token)                (empty result)
//!   Registry::schedule(id, op, token, spawn(worker))      (one critical section)
//!   return id                                             (never blocks)
//!
//! worker:
//!   ├─► acquire permit (optional, cancellable)
//!   ├─► op.run(token)  ── catch_unwind
//!   ├─► result = pending.complete(outcome)
//!   ├─► Bus::publish(result)
//!   └─► Registry::finished(id)
//!
//! run_sync(op, broadcast):
//!   id = next_id() ─► op.run(token) on the caller's task ─► Bus::publish ─► return result
//! ```
//!
//! ## Rules
//! - Launch ids start at 1, increase monotonically and are never reused.
//! - Errors returned by the body and panics inside it end up in the result's failure
//!   slot; nothing is re-raised to the caller or to the worker pool.
//! - A worker aborted through `may_interrupt` publishes nothing.
//! - A launch cancelled while waiting for a concurrency permit never runs its body.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::core::{Config, Registry};
use crate::error::{OperationError, panic_message};
use crate::events::{Bus, LaunchId, OperationResult, PendingResult};
use crate::operations::{Operation, OperationRef};

/// Executes operations and publishes their results.
pub struct Engine {
    next_id: AtomicU64,
    registry: Arc<Registry>,
    bus: Bus,
    runtime: Handle,
    runtime_token: CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
}

impl Engine {
    pub(crate) fn new(cfg: &Config, runtime: Handle, runtime_token: CancellationToken) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registry: Arc::new(Registry::new(cfg.cancelled_limit())),
            bus: Bus::new(),
            runtime,
            runtime_token,
            semaphore: cfg.concurrency_limit().map(Semaphore::new).map(Arc::new),
        }
    }

    /// Schedules `operation` on a worker and returns its launch id immediately.
    pub fn run_async<O: Operation>(&self, operation: O, broadcast: bool) -> LaunchId {
        let operation: OperationRef = Arc::new(operation);
        let id = self.next_id();
        let token = self.runtime_token.child_token();
        let pending = PendingResult::new(id, broadcast, Arc::clone(&operation), token.clone());

        tracing::debug!(
            launch = %id,
            operation = operation.name(),
            broadcast,
            "launch scheduled"
        );

        let worker = run_worker(
            pending,
            self.bus.clone(),
            Arc::clone(&self.registry),
            self.semaphore.clone(),
        );
        self.registry.schedule(id, operation, token, || {
            self.runtime.spawn(worker).abort_handle()
        });
        id
    }

    /// Runs `operation` on the caller's own task, publishes and returns the result.
    ///
    /// The launch is not registered and cannot be cancelled.
    pub async fn run_sync<O: Operation>(
        &self,
        operation: O,
        broadcast: bool,
    ) -> Arc<OperationResult> {
        let operation: OperationRef = Arc::new(operation);
        let id = self.next_id();
        tracing::debug!(launch = %id, operation = operation.name(), broadcast, "sync run");

        let pending = PendingResult::new(id, broadcast, operation, self.runtime_token.child_token());
        let result = Arc::new(execute(pending).await);
        self.bus.publish(Arc::clone(&result));
        result
    }

    /// Blocking flavour of [`run_sync`](Self::run_sync) for threads outside the runtime.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context.
    pub fn run_blocking<O: Operation>(&self, operation: O, broadcast: bool) -> Arc<OperationResult> {
        self.runtime.block_on(self.run_sync(operation, broadcast))
    }

    /// Running-operation registry of this engine.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Distribution bus results are published on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    fn next_id(&self) -> LaunchId {
        LaunchId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Body of an asynchronous launch.
async fn run_worker(
    pending: PendingResult,
    bus: Bus,
    registry: Arc<Registry>,
    semaphore: Option<Arc<Semaphore>>,
) {
    let id = pending.id();
    let token = pending.token().clone();

    let _permit = match semaphore {
        Some(sem) => tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(launch = %id, "cancelled while waiting for a permit");
                registry.finished(id);
                return;
            }
            permit = sem.acquire_owned() => match permit {
                Ok(p) => Some(p),
                Err(_closed) => {
                    registry.finished(id);
                    return;
                }
            },
        },
        None => None,
    };

    let result = execute(pending).await;
    bus.publish(Arc::new(result));
    registry.finished(id);
}

/// Runs the operation body and fills the result. Panics become [`OperationError::Panicked`].
async fn execute(pending: PendingResult) -> OperationResult {
    let fut = Arc::clone(pending.operation()).execute(pending.token().clone());

    let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(OperationError::Panicked {
            info: panic_message(&*panic),
        }),
    };

    if let Err(err) = &outcome {
        tracing::debug!(
            launch = %pending.id(),
            operation = pending.operation().name(),
            error = %err,
            label = err.as_label(),
            "operation failed"
        );
    }
    pending.complete(outcome)
}
