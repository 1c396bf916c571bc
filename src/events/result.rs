//! # Launch identity and the result container.
//!
//! A result is created **empty** ([`PendingResult`]) when a launch is scheduled,
//! bound to its [`LaunchId`], its operation and its cancellation token. The engine
//! fills it exactly once with the outcome of the body, which yields an immutable
//! [`OperationResult`] shared as `Arc` with every listener.
//!
//! ## Example
//! ```rust
//! # async fn demo() -> Result<(), taskrelay::RuntimeError> {
//! use tokio_util::sync::CancellationToken;
//! use taskrelay::{Config, OperationError, OperationFn, Relay};
//!
//! let relay = Relay::builder(Config::default()).build()?;
//! let op = OperationFn::new("answer", |_ctx: CancellationToken| async {
//!     Ok::<_, OperationError>(42u32)
//! });
//!
//! let result = relay.run(op).await;
//! assert_eq!(result.output::<u32>(), Some(&42));
//! assert!(result.error().is_none());
//! assert_eq!(result.operation_name(), "answer");
//! # Ok(())
//! # }
//! ```

use std::any::TypeId;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::OperationError;
use crate::operations::{Operation, OperationRef, Payload};

/// Identity of one launch. Issued by the engine, monotonically increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaunchId(u64);

impl LaunchId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result slot bound to a launch, not yet filled.
pub(crate) struct PendingResult {
    id: LaunchId,
    broadcast: bool,
    operation: OperationRef,
    token: CancellationToken,
}

impl PendingResult {
    pub(crate) fn new(
        id: LaunchId,
        broadcast: bool,
        operation: OperationRef,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            broadcast,
            operation,
            token,
        }
    }

    pub(crate) fn id(&self) -> LaunchId {
        self.id
    }

    pub(crate) fn operation(&self) -> &OperationRef {
        &self.operation
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fills the slot. Consumes it, so a result can only be completed once.
    pub(crate) fn complete(self, outcome: Result<Payload, OperationError>) -> OperationResult {
        OperationResult {
            id: self.id,
            broadcast: self.broadcast,
            outcome,
            operation: self.operation,
            token: self.token,
        }
    }
}

/// Finished launch: output or failure, plus the launch metadata.
pub struct OperationResult {
    id: LaunchId,
    broadcast: bool,
    outcome: Result<Payload, OperationError>,
    operation: OperationRef,
    token: CancellationToken,
}

impl OperationResult {
    /// Launch this result belongs to.
    pub fn id(&self) -> LaunchId {
        self.id
    }

    /// True if every listener (not only the launcher) may receive this result.
    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }

    /// True if the body returned an output.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Output of the body, if it succeeded and produced a `T`.
    pub fn output<T: 'static>(&self) -> Option<&T> {
        self.outcome.as_ref().ok()?.downcast_ref::<T>()
    }

    /// Failure of the body, if any.
    pub fn error(&self) -> Option<&OperationError> {
        self.outcome.as_ref().err()
    }

    /// Typed view of the outcome, `None` if the operation does not produce `T`.
    pub fn outcome<T: 'static>(&self) -> Option<Result<&T, &OperationError>> {
        if self.output_type() != TypeId::of::<T>() {
            return None;
        }
        match &self.outcome {
            Ok(payload) => payload.downcast_ref::<T>().map(Ok),
            Err(err) => Some(Err(err)),
        }
    }

    /// Name of the operation that produced this result.
    pub fn operation_name(&self) -> &str {
        self.operation.name()
    }

    /// The producing operation, if it is an `O`.
    pub fn operation<O: Operation>(&self) -> Option<&O> {
        self.operation.as_any().downcast_ref::<O>()
    }

    /// Declared output type of the producing operation.
    pub fn output_type(&self) -> TypeId {
        self.operation.output_type()
    }

    /// Declared output type name (for logs).
    pub fn output_type_name(&self) -> &'static str {
        self.operation.output_type_name()
    }

    /// True if the launch was cancelled, even if the body still ran to completion.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationResult")
            .field("id", &self.id)
            .field("operation", &self.operation_name())
            .field("output_type", &self.output_type_name())
            .field("broadcast", &self.broadcast)
            .field("error", &self.error())
            .finish()
    }
}
