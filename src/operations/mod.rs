//! # Operation abstractions.
//!
//! This module provides the operation-related types:
//! - [`Operation`] - trait for async, cooperatively cancellable units of work
//! - [`OperationFn`] - closure-backed operation
//!
//! Internally every operation is held as a type-erased `OperationRef` so the
//! engine, the registry and results can share it without knowing its output type.

mod operation;
mod operation_fn;

pub use operation::Operation;
pub use operation_fn::OperationFn;

pub(crate) use operation::{ErasedOperation, OperationRef, Payload};
