//! # Relay: the shared service handle.
//!
//! The [`Relay`] owns one [`Engine`] and one [`Listeners`] registry. Clients hold an
//! `Arc<Relay>` and reach it through [`Connector`](crate::Connector)s, or directly.
//!
//! ## Architecture
//! ```text
//! RelayBuilder::build()
//!   ├─► Engine (launch ids, Registry, Bus, semaphore)
//!   └─► Listeners (id → Listener, each with a bus receiver and a delivery task)
//!
//! Relay::shutdown()
//!   └─► runtime_token.cancel()   → operation tokens and listener delivery tasks
//!   └─► Registry::cancel_all(true)
//!   └─► Listeners::forget_cancelled(ids)
//! ```
//!
//! ## Example
//! ```rust
//! use taskrelay::{Config, OperationError, OperationFn, Relay};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::builder(Config::default()).build()?;
//!     let op = OperationFn::new("answer", |_ctx: CancellationToken| async {
//!         Ok::<_, OperationError>(42u32)
//!     });
//!
//!     let result = relay.run(op).await;
//!     assert_eq!(result.output::<u32>(), Some(&42));
//!     relay.shutdown();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Config, Engine, RelayBuilder};
use crate::events::OperationResult;
use crate::listeners::{Listener, ListenerId, Listeners};
use crate::operations::Operation;

/// Owns the execution engine and every listener.
pub struct Relay {
    cfg: Config,
    engine: Arc<Engine>,
    listeners: Listeners,
    runtime_token: CancellationToken,
}

impl Relay {
    /// Creates a builder for a relay with the given configuration.
    pub fn builder(cfg: Config) -> RelayBuilder {
        RelayBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        engine: Arc<Engine>,
        listeners: Listeners,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            engine,
            listeners,
            runtime_token,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Creates a listener with a fresh id.
    pub fn create_listener(&self) -> Arc<Listener> {
        self.listeners.create()
    }

    /// Returns the listener with `id`, creating it if it does not exist.
    pub fn listener(&self, id: ListenerId) -> Arc<Listener> {
        self.listeners.get_or_create(id)
    }

    /// Runs `operation` on the caller's task and returns its result.
    ///
    /// The result is also published, though no listener claims it as its own.
    pub async fn run<O: Operation>(&self, operation: O) -> Arc<OperationResult> {
        self.engine.run_sync(operation, false).await
    }

    /// Like [`run`](Self::run), but listeners receive the result as a broadcast.
    pub async fn run_broadcast<O: Operation>(&self, operation: O) -> Arc<OperationResult> {
        self.engine.run_sync(operation, true).await
    }

    /// Cancels every running launch. Returns how many were cancelled.
    ///
    /// Listeners drop their records of the cancelled launches.
    pub fn cancel_all(&self, may_interrupt: bool) -> usize {
        let ids = self.engine.registry().cancel_all(may_interrupt);
        self.listeners.forget_cancelled(&ids);
        ids.len()
    }

    /// Stops listener delivery and interrupts every running launch.
    pub fn shutdown(&self) {
        self.runtime_token.cancel();
        let cancelled = self.cancel_all(true);
        tracing::info!(cancelled, listeners = self.listeners.len(), "relay shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::testkit::{gated, value, wait_until};

    #[test]
    fn build_outside_runtime_fails() {
        let err = Relay::builder(Config::default()).build().err();
        assert_eq!(err, Some(RuntimeError::NoRuntime));
    }

    #[test]
    fn build_with_explicit_handle() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let relay = Relay::builder(Config::default())
            .runtime(rt.handle().clone())
            .build()
            .expect("relay");
        let result = relay.engine().run_blocking(value(3), false);
        assert_eq!(result.output::<u32>(), Some(&3));
    }

    #[tokio::test]
    async fn run_returns_result_directly() {
        let relay = Relay::builder(Config::default()).build().expect("relay");

        let own = relay.run(value(7)).await;
        assert!(!own.is_broadcast());
        assert_eq!(own.output::<u32>(), Some(&7));

        let shared = relay.run_broadcast(value(8)).await;
        assert!(shared.is_broadcast());
        assert_eq!(shared.output::<u32>(), Some(&8));
    }

    #[tokio::test]
    async fn listener_ids_are_stable() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let a = relay.create_listener();
        let again = relay.listener(a.id());
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(relay.listeners().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_everything() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let (op, gate) = gated(1);
        let id = relay.engine().run_async(op, false);
        gate.started().await;

        relay.shutdown();
        assert!(relay.is_shut_down());
        assert!(relay.engine().registry().is_cancelled(id));
        wait_until(|| relay.engine().registry().is_empty()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_all_counts_running_launches() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let (first, _g1) = gated(1);
        let (second, _g2) = gated(2);
        relay.engine().run_async(first, false);
        relay.engine().run_async(second, false);

        assert_eq!(relay.cancel_all(false), 2);
        assert_eq!(relay.cancel_all(false), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_all_clears_listener_bookkeeping() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let listener = relay.create_listener();
        let mut gates = Vec::new();
        let mut ids = Vec::new();
        for v in 0..20 {
            let (op, gate) = gated(v);
            ids.push(listener.launch(op, false));
            gates.push(gate);
        }
        let (op, tagged_gate) = gated(99);
        listener.launch_tagged(op, "sync", false);
        gates.push(tagged_gate);
        assert_eq!(listener.in_flight(), 21);

        assert_eq!(relay.cancel_all(true), 21);
        assert_eq!(listener.in_flight(), 0);
        assert!(!listener.is_tag_running("sync"));
        for id in ids {
            assert!(!listener.cancel(id, true));
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(listener.in_flight(), 0);
        assert_eq!(listener.pending_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_clears_listener_bookkeeping() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let listener = relay.create_listener();
        let (op, gate) = gated(1);
        listener.launch(op, true);
        gate.started().await;

        relay.shutdown();
        assert_eq!(listener.in_flight(), 0);
    }
}
