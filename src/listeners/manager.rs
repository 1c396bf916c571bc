//! # Listener registry.
//!
//! Maps [`ListenerId`]s to live [`Listener`]s. Ids are issued from 0 upward;
//! restoring a persisted id re-creates the listener under that id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Listener, ListenerId};
use crate::core::Engine;
use crate::events::LaunchId;

struct Table {
    next_id: u64,
    listeners: HashMap<ListenerId, Arc<Listener>>,
}

/// Registry of the relay's listeners.
pub struct Listeners {
    engine: Arc<Engine>,
    pending_limit: Option<usize>,
    shutdown: CancellationToken,
    table: Mutex<Table>,
}

impl Listeners {
    pub(crate) fn new(
        engine: Arc<Engine>,
        pending_limit: Option<usize>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            pending_limit,
            shutdown,
            table: Mutex::new(Table {
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    /// Creates a listener under a fresh id.
    pub fn create(&self) -> Arc<Listener> {
        let mut table = self.table.lock();
        let id = ListenerId::from(table.next_id);
        table.next_id += 1;
        self.insert(&mut table, id)
    }

    /// Returns the listener registered under `id`, creating it if missing.
    pub fn get_or_create(&self, id: ListenerId) -> Arc<Listener> {
        let mut table = self.table.lock();
        if let Some(existing) = table.listeners.get(&id) {
            return Arc::clone(existing);
        }
        table.next_id = table.next_id.max(id.get().saturating_add(1));
        tracing::debug!(listener = %id, "listener restored");
        self.insert(&mut table, id)
    }

    pub fn get(&self, id: ListenerId) -> Option<Arc<Listener>> {
        self.table.lock().listeners.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().listeners.is_empty()
    }

    /// Tells every listener that `ids` were cancelled outside of it.
    pub(crate) fn forget_cancelled(&self, ids: &[LaunchId]) {
        if ids.is_empty() {
            return;
        }
        let listeners: Vec<Arc<Listener>> = self.table.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener.forget_cancelled(ids);
        }
    }

    fn insert(&self, table: &mut Table, id: ListenerId) -> Arc<Listener> {
        let listener = Listener::spawn(
            id,
            Arc::clone(&self.engine),
            self.pending_limit,
            self.shutdown.child_token(),
        );
        table.listeners.insert(id, Arc::clone(&listener));
        listener
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Config, Relay};
    use crate::listeners::ListenerId;

    #[tokio::test]
    async fn ids_start_at_zero_and_increase() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let listeners = relay.listeners();
        assert!(listeners.is_empty());

        assert_eq!(listeners.create().id().get(), 0);
        assert_eq!(listeners.create().id().get(), 1);
        assert_eq!(listeners.len(), 2);
        assert!(listeners.get(ListenerId::from(1)).is_some());
        assert!(listeners.get(ListenerId::from(2)).is_none());
    }

    #[tokio::test]
    async fn restored_id_is_never_reissued() {
        let relay = Relay::builder(Config::default()).build().expect("relay");
        let listeners = relay.listeners();

        let restored = listeners.get_or_create(ListenerId::from(7));
        assert_eq!(restored.id().get(), 7);
        assert_eq!(listeners.create().id().get(), 8);

        let again = listeners.get_or_create(ListenerId::from(7));
        assert!(std::sync::Arc::ptr_eq(&restored, &again));
        assert_eq!(listeners.len(), 2);
    }
}
