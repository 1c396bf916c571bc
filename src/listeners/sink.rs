//! # Client-side result handlers.
//!
//! A [`ResultSink`] is the client's receiving end: a set of typed handlers keyed by
//! the operation's output type. Own results and broadcast results have separate
//! handler tables.
//!
//! ```text
//! Listener delivery task
//!   └─► sink.dispatch(result, mode)
//!         ├─ lookup (mode, result.output_type())
//!         │    ├─ found   ─► handler(Delivered<T>)   ── catch_unwind
//!         │    └─ missing ─► DeliveryError::NoHandler
//!         └─ panic       ─► DeliveryError::HandlerPanicked
//! ```
//!
//! ## Example
//! ```rust
//! use taskrelay::{Delivered, ResultSink};
//!
//! let sink = ResultSink::builder()
//!     .name("screen")
//!     .on_result::<u32, _>(|d: Delivered<'_, u32>| {
//!         if let Ok(v) = d.output {
//!             println!("launch {} produced {v}", d.id);
//!         }
//!     })
//!     .build();
//!
//! assert!(sink.accepts::<u32>(false));
//! assert!(!sink.accepts::<u32>(true));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::{DeliveryError, OperationError, panic_message};
use crate::events::{LaunchId, OperationResult};

type Handler = Box<dyn Fn(&OperationResult) + Send + Sync>;

/// How a result reached the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The listener launched the operation itself.
    Normal,
    /// Someone launched it as a broadcast.
    Broadcast,
}

/// Typed view of a result handed to a handler.
pub struct Delivered<'a, T> {
    /// Launch the result belongs to.
    pub id: LaunchId,
    /// Whether the result arrived as a broadcast.
    pub broadcast: bool,
    /// Output on success, error otherwise.
    pub output: Result<&'a T, &'a OperationError>,
    /// The full result, for metadata such as the operation name.
    pub result: &'a OperationResult,
}

/// Set of typed result handlers owned by a client.
pub struct ResultSink {
    name: String,
    own: HashMap<TypeId, Handler>,
    broadcast: HashMap<TypeId, Handler>,
}

impl ResultSink {
    pub fn builder() -> ResultSinkBuilder {
        ResultSinkBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if a handler for output type `T` exists for the given channel.
    pub fn accepts<T: 'static>(&self, broadcast: bool) -> bool {
        self.table(broadcast).contains_key(&TypeId::of::<T>())
    }

    /// Hands `result` to the matching handler.
    pub(crate) fn dispatch(
        &self,
        result: &OperationResult,
        mode: DeliveryMode,
    ) -> Result<(), DeliveryError> {
        let table = self.table(mode == DeliveryMode::Broadcast);
        let Some(handler) = table.get(&result.output_type()) else {
            return Err(DeliveryError::NoHandler {
                id: result.id(),
                output_type: result.output_type_name(),
            });
        };
        catch_unwind(AssertUnwindSafe(|| handler(result))).map_err(|panic| {
            DeliveryError::HandlerPanicked {
                id: result.id(),
                info: panic_message(&*panic),
            }
        })
    }

    fn table(&self, broadcast: bool) -> &HashMap<TypeId, Handler> {
        if broadcast { &self.broadcast } else { &self.own }
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("name", &self.name)
            .field("own_handlers", &self.own.len())
            .field("broadcast_handlers", &self.broadcast.len())
            .finish()
    }
}

/// Builder for [`ResultSink`].
#[derive(Default)]
pub struct ResultSinkBuilder {
    name: Option<String>,
    own: HashMap<TypeId, Handler>,
    broadcast: HashMap<TypeId, Handler>,
}

impl ResultSinkBuilder {
    /// Name used in logs. Defaults to `"sink"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Handles results of the client's own launches whose output type is `T`.
    ///
    /// Registering a second handler for the same `T` replaces the first.
    pub fn on_result<T, F>(mut self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Delivered<'_, T>) + Send + Sync + 'static,
    {
        self.own.insert(TypeId::of::<T>(), typed(f, false));
        self
    }

    /// Handles broadcast results whose output type is `T`.
    pub fn on_broadcast<T, F>(mut self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Delivered<'_, T>) + Send + Sync + 'static,
    {
        self.broadcast.insert(TypeId::of::<T>(), typed(f, true));
        self
    }

    pub fn build(self) -> Arc<ResultSink> {
        Arc::new(ResultSink {
            name: self.name.unwrap_or_else(|| "sink".to_string()),
            own: self.own,
            broadcast: self.broadcast,
        })
    }
}

fn typed<T, F>(f: F, broadcast: bool) -> Handler
where
    T: Send + Sync + 'static,
    F: Fn(Delivered<'_, T>) + Send + Sync + 'static,
{
    Box::new(move |result: &OperationResult| {
        // Keyed by TypeId, so a mismatch here means the table is corrupt.
        let Some(output) = result.outcome::<T>() else {
            tracing::error!(launch = %result.id(), "handler type mismatch");
            return;
        };
        f(Delivered {
            id: result.id(),
            broadcast,
            output,
            result,
        });
    })
}
