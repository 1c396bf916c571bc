//! Results and the distribution bus.
//!
//! This module groups the result **data model** and the **bus** that carries
//! finished results from workers to listeners.
//!
//! ## Contents
//! - [`LaunchId`] identity of one scheduling of an operation
//! - [`OperationResult`] output-or-failure of a launch, plus its metadata
//! - [`Bus`] fan-out of published results to every subscribed listener
//!
//! ## Quick reference
//! - **Publishers**: engine workers (`run_async`) and callers of `run_sync`.
//! - **Consumers**: one delivery task per [`Listener`](crate::Listener).

mod bus;
mod result;

pub use bus::Bus;
pub use result::{LaunchId, OperationResult};

pub(crate) use result::PendingResult;
