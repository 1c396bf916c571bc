//! # taskrelay
//!
//! **Taskrelay** runs background operations on behalf of clients that come and go,
//! and routes each result back to the client that asked for it, whenever that
//! client is ready to take it.
//!
//! A client launches an operation through its listener and gets a launch id back
//! immediately. The result travels to every listener; the originating listener
//! claims it, buffers it while its client is inactive, and hands it over on the
//! next activation. Results launched as *broadcasts* are also offered to every
//! other listener.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Connector   │   │  Connector   │   │  Connector   │
//!     │ (client #1)  │   │ (client #2)  │   │ (client #3)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Listener 0  │   │  Listener 1  │   │  Listener 2  │
//!     │ tags, ids,   │   │ tags, ids,   │   │ tags, ids,   │
//!     │ pending buf  │   │ pending buf  │   │ pending buf  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ launch           │ launch           │ launch
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Relay                                                            │
//! │  - Engine (launch ids, workers, optional semaphore)               │
//! │  - Registry (running launches, cancelled ids)                     │
//! │  - Listeners (listener id → listener)                             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    worker    │   │    worker    │   │    worker    │
//!     │ op.run(ctx)  │   │ op.run(ctx)  │   │ op.run(ctx)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ publish(OperationResult)            │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  Bus (one unbounded queue per listener)           │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  delivery task 0    delivery task 1    delivery task 2
//!  own? broadcast?    own? broadcast?    own? broadcast?
//!        ▼                  ▼                  ▼
//!  ResultSink #1      ResultSink #2      (inactive: buffered)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Connector::run_operation(op) ──► Listener::launch ──► Engine::run_async ──► LaunchId
//!
//! worker:
//!   ├─► acquire permit (optional, cancellable)
//!   ├─► op.run(token)            (panics captured)
//!   ├─► Bus::publish(result)
//!   └─► Registry::finished(id)
//!
//! listener delivery task:
//!   ├─ cancelled?        ─► drop
//!   ├─ own id            ─► Normal
//!   ├─ broadcast flag    ─► Broadcast
//!   ├─ otherwise         ─► ignore
//!   └─ active ? sink.dispatch(result) : buffer
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                      |
//! |-------------------|--------------------------------------------------------------|-----------------------------------------|
//! | **Operations**    | Define units of work as trait impls or closures.             | [`Operation`], [`OperationFn`]          |
//! | **Results**       | Typed output or failure, launch id, broadcast flag.          | [`OperationResult`], [`LaunchId`]       |
//! | **Listeners**     | Per-client bookkeeping, tags, buffering, ordered delivery.   | [`Listener`], [`Listeners`]             |
//! | **Clients**       | Typed handlers and lifecycle binding.                        | [`ResultSink`], [`Connector`]           |
//! | **Runtime**       | Execution, cancellation, shutdown.                           | [`Relay`], [`Engine`], [`Registry`]     |
//! | **Errors**        | Typed errors for operations, delivery and setup.             | [`OperationError`], [`RuntimeError`]    |
//! | **Configuration** | Centralize runtime settings.                                 | [`Config`]                              |
//!
//! ## Example
//! ```rust
//! use taskrelay::{Config, Connector, Delivered, OperationError, OperationFn, Relay, ResultSink};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::builder(Config::default()).build()?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let sink = ResultSink::builder()
//!         .name("screen")
//!         .on_result::<u32, _>(move |d: Delivered<'_, u32>| {
//!             let _ = tx.send(d.output.copied().map_err(Clone::clone));
//!         })
//!         .build();
//!
//!     let connector = Connector::attach(&relay, sink, None);
//!     connector.activate();
//!     connector.run_operation_tagged(
//!         OperationFn::new("answer", |_ctx: CancellationToken| async {
//!             Ok::<_, OperationError>(42u32)
//!         }),
//!         "answer",
//!     );
//!
//!     assert_eq!(rx.recv().await, Some(Ok(42)));
//!     relay.shutdown();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod listeners;
mod operations;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use crate::core::{Config, Engine, Registry, Relay, RelayBuilder};
pub use error::{DeliveryError, OperationError, RuntimeError};
pub use events::{Bus, LaunchId, OperationResult};
pub use listeners::{
    Activation, Connector, Delivered, DeliveryMode, Listener, ListenerId, Listeners, ResultSink,
    ResultSinkBuilder,
};
pub use operations::{Operation, OperationFn};
