//! # Relay runtime configuration.
//!
//! Provides [`Config`], the centralized settings for a [`Relay`](crate::Relay).
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `pending_capacity = 0` → unbounded per-listener buffer
//! - `cancelled_retention = 0` → cancelled launch ids are never forgotten

/// Configuration for the relay runtime.
///
/// ## Field semantics
/// - `max_concurrent`: operation bodies running at once (`0` = unlimited)
/// - `pending_capacity`: results buffered per inactive listener before the oldest is dropped
/// - `cancelled_retention`: cancelled launch ids remembered by the registry
/// - `interrupt_on_cancel`: whether [`Connector`](crate::Connector) cancellations abort the worker
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking the `0` sentinels directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of operation bodies executing concurrently.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = launches beyond `n` wait for a free permit before running
    ///
    /// Only asynchronous launches take a permit; `run_sync` executes on the caller.
    pub max_concurrent: usize,

    /// Capacity of each listener's buffer of undelivered results.
    ///
    /// When an inactive listener already holds this many results, the oldest one is
    /// dropped to make room. Buffered results are never guaranteed to be delivered.
    pub pending_capacity: usize,

    /// How many cancelled launch ids the registry keeps for `is_cancelled` lookups.
    ///
    /// Oldest ids are forgotten first. Result suppression does not depend on this
    /// record alone: the cancellation token travels with the result.
    pub cancelled_retention: usize,

    /// Default `may_interrupt` flag used by the connector's `cancel` helpers.
    pub interrupt_on_cancel: bool,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent operation bodies
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the per-listener buffer limit, `None` if unbounded.
    #[inline]
    pub fn pending_limit(&self) -> Option<usize> {
        if self.pending_capacity == 0 {
            None
        } else {
            Some(self.pending_capacity)
        }
    }

    /// Returns the cancelled-id retention limit, `None` if unbounded.
    #[inline]
    pub fn cancelled_limit(&self) -> Option<usize> {
        if self.cancelled_retention == 0 {
            None
        } else {
            Some(self.cancelled_retention)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 0` (unlimited)
    /// - `pending_capacity = 256`
    /// - `cancelled_retention = 4096`
    /// - `interrupt_on_cancel = true`
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            pending_capacity: 256,
            cancelled_retention: 4096,
            interrupt_on_cancel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_unbounded() {
        let cfg = Config {
            max_concurrent: 0,
            pending_capacity: 0,
            cancelled_retention: 0,
            interrupt_on_cancel: false,
        };
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.pending_limit(), None);
        assert_eq!(cfg.cancelled_limit(), None);
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.pending_limit(), Some(256));
        assert_eq!(cfg.cancelled_limit(), Some(4096));
        assert!(cfg.interrupt_on_cancel);
    }
}
