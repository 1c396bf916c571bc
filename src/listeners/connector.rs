//! # Connector: binds a client's lifecycle to a listener.
//!
//! A client that comes and goes (a screen, a session, a reconnecting peer) keeps
//! one [`Connector`]. On creation it either gets a fresh listener or, given the
//! listener id it persisted earlier, reattaches to the listener that kept
//! buffering its results in the meantime.
//!
//! ```text
//! attach(relay, sink, None)       ─► Listeners::create()
//! attach(relay, sink, Some(id))   ─► Listeners::get_or_create(id)
//! activate()                      ─► Listener::activate(sink)    (buffer flushed)
//! persist_listener_id()           ─► u64 to store with the client
//! deactivate()                    ─► Listener::deactivate()      (results buffered)
//! ```
//!
//! ## Example
//! ```rust
//! use taskrelay::{Config, Connector, Delivered, OperationError, OperationFn, Relay, ResultSink};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::builder(Config::default()).build()?;
//!     let sink = ResultSink::builder()
//!         .on_result::<u32, _>(|d: Delivered<'_, u32>| println!("{}: {:?}", d.id, d.output))
//!         .build();
//!
//!     let connector = Connector::attach(&relay, sink, None);
//!     connector.activate();
//!     let id = connector.run_operation(
//!         OperationFn::new("answer", |_ctx: CancellationToken| async {
//!             Ok::<_, OperationError>(42u32)
//!         }),
//!     );
//!
//!     let saved = connector.persist_listener_id();
//!     connector.deactivate();
//!     # let _ = (id, saved);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use super::{Listener, ListenerId, ResultSink};
use crate::core::Relay;
use crate::events::LaunchId;
use crate::operations::Operation;

/// Lifecycle adapter between one client and its listener.
pub struct Connector {
    listener: Arc<Listener>,
    sink: Arc<ResultSink>,
    interrupt_on_cancel: bool,
}

impl Connector {
    /// Binds `sink` to a new listener, or to the one saved as `restored`.
    pub fn attach(relay: &Relay, sink: Arc<ResultSink>, restored: Option<ListenerId>) -> Self {
        let listener = match restored {
            Some(id) => relay.listener(id),
            None => relay.create_listener(),
        };
        tracing::debug!(listener = %listener.id(), sink = sink.name(), "connector attached");
        Self {
            listener,
            sink,
            interrupt_on_cancel: relay.config().interrupt_on_cancel,
        }
    }

    /// The client is ready: buffered results are delivered, then new ones as they come.
    pub fn activate(&self) {
        self.listener.activate(&self.sink);
    }

    /// The client went away: results are buffered until the next activation.
    pub fn deactivate(&self) {
        self.listener.deactivate();
    }

    /// Listener id to store with the client and pass back to [`attach`](Self::attach).
    pub fn persist_listener_id(&self) -> u64 {
        self.listener.id().get()
    }

    pub fn listener(&self) -> &Arc<Listener> {
        &self.listener
    }

    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    pub fn run_operation<O: Operation>(&self, operation: O) -> LaunchId {
        self.listener.launch(operation, false)
    }

    /// Runs `operation` unless a launch tagged `tag` is still running.
    pub fn run_operation_tagged<O: Operation>(&self, operation: O, tag: &str) -> LaunchId {
        self.listener.launch_tagged(operation, tag, false)
    }

    /// Runs `operation`; every other listener also receives its result.
    pub fn run_broadcast<O: Operation>(&self, operation: O) -> LaunchId {
        self.listener.launch(operation, true)
    }

    pub fn run_broadcast_tagged<O: Operation>(&self, operation: O, tag: &str) -> LaunchId {
        self.listener.launch_tagged(operation, tag, true)
    }

    /// Cancels one of this client's launches.
    pub fn cancel(&self, id: LaunchId) -> bool {
        self.listener.cancel(id, self.interrupt_on_cancel)
    }

    pub fn cancel_tag(&self, tag: &str) -> bool {
        self.listener.cancel_tag(tag, self.interrupt_on_cancel)
    }

    pub fn is_running(&self, id: LaunchId) -> bool {
        self.listener.is_running(id)
    }

    pub fn is_tag_running(&self, tag: &str) -> bool {
        self.listener.is_tag_running(tag)
    }
}
