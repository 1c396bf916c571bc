//! Error types used by the relay runtime, operations and result delivery.
//!
//! This module defines three enums:
//!
//! - [`OperationError`]: failures of a single operation body, stored in the result.
//! - [`DeliveryError`]: a result could not be handed to a client's sink.
//! - [`RuntimeError`]: the relay itself could not be constructed.
//!
//! All of them provide `as_label` for logs. None of them is ever raised across
//! the worker/listener boundary: operation failures travel inside
//! [`OperationResult`](crate::OperationResult), delivery failures are logged.

use std::fmt;

use thiserror::Error;

use crate::events::LaunchId;

/// # Errors produced by operation bodies.
///
/// An operation that fails does not crash anything: the engine captures the
/// error into the result's failure slot and delivers it like any other result.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Operation body returned an error.
    #[error("operation failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Operation observed its cancellation token and stopped early.
    #[error("operation cancelled")]
    Canceled,

    /// Operation body panicked; the panic was contained by the worker.
    #[error("operation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl OperationError {
    /// Builds [`OperationError::Failed`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use taskrelay::OperationError;
    ///
    /// let err = OperationError::failed("disk full");
    /// assert_eq!(err.to_string(), "operation failed: disk full");
    /// ```
    pub fn failed(error: impl fmt::Display) -> Self {
        OperationError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationError::Failed { .. } => "operation_failed",
            OperationError::Canceled => "operation_canceled",
            OperationError::Panicked { .. } => "operation_panicked",
        }
    }

    /// True if the body gave up because it was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, OperationError::Canceled)
    }
}

/// # Errors produced while handing a result to a client.
///
/// These are integration defects on the client side. The listener reports them
/// through `tracing` and carries on with the next result.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The client registered no handler for the result's output type.
    #[error("no handler for result {id} of type {output_type}")]
    NoHandler {
        /// Launch the result belongs to.
        id: LaunchId,
        /// Declared output type of the operation.
        output_type: &'static str,
    },

    /// The client's handler panicked.
    #[error("handler for result {id} panicked: {info}")]
    HandlerPanicked {
        /// Launch the result belongs to.
        id: LaunchId,
        /// Panic payload rendered as text.
        info: String,
    },
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::NoHandler { .. } => "delivery_no_handler",
            DeliveryError::HandlerPanicked { .. } => "delivery_handler_panicked",
        }
    }
}

/// # Errors produced by the relay runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// No tokio runtime handle was given and none is current.
    #[error("no tokio runtime available; build inside a runtime or pass a handle")]
    NoRuntime,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskrelay::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::NoRuntime.as_label(), "runtime_missing");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoRuntime => "runtime_missing",
        }
    }
}

/// Renders a caught panic payload the way the worker and listener report it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(OperationError::failed("x").as_label(), "operation_failed");
        assert_eq!(OperationError::Canceled.as_label(), "operation_canceled");
        let err = DeliveryError::NoHandler {
            id: LaunchId::new(3),
            output_type: "u32",
        };
        assert_eq!(err.as_label(), "delivery_no_handler");
        assert_eq!(err.to_string(), "no handler for result #3 of type u32");
    }

    #[test]
    fn panic_payloads_render() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
