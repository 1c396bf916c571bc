//! # Operation trait and its type-erased form.
//!
//! An [`Operation`] is a unit of work with an associated `Output` type. It runs on a
//! worker of the relay runtime and receives a [`CancellationToken`] that flips once
//! the launch is cancelled. The token is advisory: the body decides when to check it.
//!
//! The engine does not know `Output` statically. It stores operations as
//! [`OperationRef`] (`Arc<dyn ErasedOperation>`), which boxes the output into a
//! [`Payload`] and remembers its [`TypeId`] so results can be dispatched to the
//! matching client handler later.

use std::any::{Any, TypeId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::OperationError;

/// Boxed operation output as carried by results.
pub(crate) type Payload = Box<dyn Any + Send + Sync>;

/// Future returned by [`ErasedOperation::execute`].
pub(crate) type BoxOutputFuture = Pin<Box<dyn Future<Output = Result<Payload, OperationError>> + Send>>;

/// Shared, type-erased operation handle.
pub(crate) type OperationRef = Arc<dyn ErasedOperation>;

/// # Asynchronous, cooperatively cancellable unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskrelay::{Operation, OperationError};
///
/// struct Checksum(Vec<u8>);
///
/// #[async_trait]
/// impl Operation for Checksum {
///     type Output = u32;
///
///     async fn run(&self, ctx: CancellationToken) -> Result<u32, OperationError> {
///         let mut sum = 0u32;
///         for chunk in self.0.chunks(1024) {
///             if ctx.is_cancelled() {
///                 return Err(OperationError::Canceled);
///             }
///             sum = chunk.iter().fold(sum, |acc, b| acc.wrapping_add(*b as u32));
///         }
///         Ok(sum)
///     }
/// }
/// ```
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Value produced on success. Clients register handlers per output type.
    type Output: Send + Sync + 'static;

    /// Human-readable operation name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Executes the operation.
    ///
    /// Long bodies should check `ctx.is_cancelled()` and return
    /// [`OperationError::Canceled`] early; their result is suppressed anyway.
    async fn run(&self, ctx: CancellationToken) -> Result<Self::Output, OperationError>;
}

/// Object-safe view of an [`Operation`] with its output boxed.
pub(crate) trait ErasedOperation: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn output_type(&self) -> TypeId;

    fn output_type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn execute(self: Arc<Self>, ctx: CancellationToken) -> BoxOutputFuture;
}

impl<O: Operation> ErasedOperation for O {
    fn name(&self) -> &str {
        Operation::name(self)
    }

    fn output_type(&self) -> TypeId {
        TypeId::of::<O::Output>()
    }

    fn output_type_name(&self) -> &'static str {
        std::any::type_name::<O::Output>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn execute(self: Arc<Self>, ctx: CancellationToken) -> BoxOutputFuture {
        Box::pin(async move {
            let output = self.run(ctx).await?;
            Ok(Box::new(output) as Payload)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Double(u64);

    #[async_trait]
    impl Operation for Double {
        type Output = u64;

        fn name(&self) -> &str {
            "double"
        }

        async fn run(&self, _ctx: CancellationToken) -> Result<u64, OperationError> {
            Ok(self.0 * 2)
        }
    }

    #[tokio::test]
    async fn erased_operation_boxes_output() {
        let op: OperationRef = Arc::new(Double(21));
        assert_eq!(op.name(), "double");
        assert_eq!(op.output_type(), TypeId::of::<u64>());
        assert_eq!(op.output_type_name(), "u64");
        assert!(op.as_any().downcast_ref::<Double>().is_some());

        let payload = op.execute(CancellationToken::new()).await.expect("ok");
        assert_eq!(payload.downcast_ref::<u64>(), Some(&42));
    }
}
