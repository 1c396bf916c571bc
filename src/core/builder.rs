use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Config, Engine, Relay};
use crate::error::RuntimeError;
use crate::listeners::Listeners;

/// Builder for constructing a [`Relay`].
pub struct RelayBuilder {
    cfg: Config,
    runtime: Option<Handle>,
}

impl RelayBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self { cfg, runtime: None }
    }

    /// Runs workers and listener delivery tasks on `handle`.
    ///
    /// Without it, [`build`](Self::build) uses the runtime it is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds and returns the relay.
    ///
    /// This consumes the builder and initializes:
    /// - the engine (launch ids, registry, bus, optional semaphore)
    /// - the listener registry (empty)
    ///
    /// Fails with [`RuntimeError::NoRuntime`] when no handle was given and the
    /// caller is outside a tokio runtime.
    pub fn build(self) -> Result<Arc<Relay>, RuntimeError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?,
        };
        let runtime_token = CancellationToken::new();

        let engine = Arc::new(Engine::new(&self.cfg, runtime, runtime_token.clone()));
        let listeners = Listeners::new(
            Arc::clone(&engine),
            self.cfg.pending_limit(),
            runtime_token.clone(),
        );

        tracing::debug!(
            max_concurrent = self.cfg.max_concurrent,
            pending_capacity = self.cfg.pending_capacity,
            "relay built"
        );
        Ok(Arc::new(Relay::new_internal(
            self.cfg,
            engine,
            listeners,
            runtime_token,
        )))
    }
}
