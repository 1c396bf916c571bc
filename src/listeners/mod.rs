//! Client-facing side of the relay.
//!
//! - [`Listener`]: per-client launch bookkeeping, buffering and ordered delivery;
//! - [`Listeners`]: id → listener registry;
//! - [`ResultSink`]: typed handlers a client registers for its results;
//! - [`Connector`]: binds a client's lifecycle to one listener.

mod connector;
mod listener;
mod manager;
mod sink;

pub use connector::Connector;
pub use listener::{Activation, Listener, ListenerId};
pub use manager::Listeners;
pub use sink::{Delivered, DeliveryMode, ResultSink, ResultSinkBuilder};
