//! Runtime core: execution, bookkeeping and wiring.
//!
//! Public API from this module:
//! - [`Relay`] (built with [`RelayBuilder`]) owns one engine and one listener registry;
//! - [`Engine`] issues launch ids, runs operations and publishes results;
//! - [`Registry`] tracks running launches and cancellations;
//! - [`Config`] centralizes runtime settings.
//!
//! Internal modules:
//! - [`engine`]: async/sync execution with failure capture and publication;
//! - [`registry`]: running-operation table and cancelled-id record;
//! - [`builder`]: relay construction on a tokio runtime handle;
//! - [`relay`]: the service handle passed to clients.

mod builder;
mod config;
mod engine;
mod registry;
mod relay;

pub use builder::RelayBuilder;
pub use config::Config;
pub use engine::Engine;
pub use registry::Registry;
pub use relay::Relay;
