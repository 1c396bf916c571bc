//! # Per-client listener.
//!
//! A [`Listener`] launches operations on behalf of one client, remembers which
//! launches are its own, and hands results to the client's [`ResultSink`] while the
//! client is active. Results arriving while inactive are buffered and flushed in
//! arrival order on the next activation.
//!
//! ## Architecture
//! ```text
//! client ── launch / launch_tagged ──► state lock { dedup, Engine::run_async, record id }
//! client ── cancel / cancel_tag    ──► own id? ──► Registry::cancel
//!
//! Bus ──► [queue] ──► delivery task (one per listener)
//!                       ├─ shutdown token cancelled ─► exit
//!                       ├─ flush requested          ─► drain
//!                       └─ result received          ─► intake
//!
//! intake(result):
//!   cancelled (token or registry)? ─► forget id, drop
//!   classify:
//!     own untagged id  ─► Normal   (id forgotten)
//!     own tagged id    ─► Normal   (tag kept, marked received)
//!     broadcast flag   ─► Broadcast
//!     otherwise        ─► ignore
//!   pending.push_back(result, mode)     (drop oldest when full)
//!   drain()
//!
//! drain():
//!   while Active && sink alive && pending non-empty:
//!     pop front ─► sink.dispatch (outside the state lock)
//! ```
//!
//! ## Rules
//! - A (listener, tag) pair has at most one running launch; a second launch of a
//!   running tag returns the existing id and schedules nothing.
//! - Only this listener's own ids can be cancelled through it.
//! - Cancelled results are never delivered, even if the body ran to completion.
//! - Delivery happens only on the delivery task, so handlers see results in
//!   arrival order and may call back into the listener.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use super::sink::{DeliveryMode, ResultSink};
use crate::core::Engine;
use crate::error::DeliveryError;
use crate::events::{LaunchId, OperationResult};
use crate::operations::Operation;

/// Identity of a listener. The only piece of client state worth persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw integer value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ListenerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Whether the listener's client is ready to receive results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Inactive,
    Active,
}

struct TagEntry {
    id: LaunchId,
    /// Set once the launch's result went through intake (or the launch was cancelled).
    received: bool,
}

struct Pending {
    result: Arc<OperationResult>,
    mode: DeliveryMode,
}

struct State {
    tagged: HashMap<String, TagEntry>,
    untagged: HashSet<LaunchId>,
    activation: Activation,
    pending: VecDeque<Pending>,
    evicted: u64,
    sink: Option<Weak<ResultSink>>,
}

impl State {
    fn owns(&self, id: LaunchId) -> bool {
        self.untagged.contains(&id) || self.tagged.values().any(|e| e.id == id)
    }

    /// Drops every record of `id` that would route its result to this client.
    fn forget(&mut self, id: LaunchId) {
        self.untagged.remove(&id);
        for entry in self.tagged.values_mut().filter(|e| e.id == id) {
            entry.received = true;
        }
    }

    fn classify(&mut self, result: &OperationResult) -> Option<DeliveryMode> {
        let id = result.id();
        if self.untagged.remove(&id) {
            return Some(DeliveryMode::Normal);
        }
        if let Some(entry) = self.tagged.values_mut().find(|e| e.id == id) {
            entry.received = true;
            return Some(DeliveryMode::Normal);
        }
        result.is_broadcast().then_some(DeliveryMode::Broadcast)
    }

    fn live_sink(&self) -> Option<Arc<ResultSink>> {
        self.sink.as_ref().and_then(Weak::upgrade)
    }
}

/// Per-client launch bookkeeping and result delivery.
pub struct Listener {
    id: ListenerId,
    engine: Arc<Engine>,
    pending_limit: Option<usize>,
    state: Mutex<State>,
    flush: Arc<Notify>,
}

impl Listener {
    /// Creates the listener, subscribes it to the bus and starts its delivery task.
    pub(crate) fn spawn(
        id: ListenerId,
        engine: Arc<Engine>,
        pending_limit: Option<usize>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let rx = engine.bus().subscribe();
        let listener = Arc::new(Self {
            id,
            engine,
            pending_limit,
            state: Mutex::new(State {
                tagged: HashMap::new(),
                untagged: HashSet::new(),
                activation: Activation::Inactive,
                pending: VecDeque::new(),
                evicted: 0,
                sink: None,
            }),
            flush: Arc::new(Notify::new()),
        });

        listener.engine.runtime().spawn(deliver_loop(
            Arc::downgrade(&listener),
            Arc::clone(&listener.flush),
            rx,
            shutdown,
        ));
        tracing::debug!(listener = %id, "listener created");
        listener
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Attaches `sink` and flushes buffered results to it.
    ///
    /// Only a weak handle is kept; dropping the sink makes the listener buffer again.
    pub fn activate(&self, sink: &Arc<ResultSink>) {
        {
            let mut state = self.state.lock();
            state.sink = Some(Arc::downgrade(sink));
            state.activation = Activation::Active;
            tracing::debug!(
                listener = %self.id,
                sink = sink.name(),
                pending = state.pending.len(),
                "listener activated"
            );
        }
        self.flush.notify_one();
    }

    /// Detaches the client. Buffered results stay buffered.
    pub fn deactivate(&self) {
        let mut state = self.state.lock();
        state.sink = None;
        state.activation = Activation::Inactive;
        tracing::debug!(listener = %self.id, "listener deactivated");
    }

    pub fn activation(&self) -> Activation {
        self.state.lock().activation
    }

    pub fn is_active(&self) -> bool {
        self.activation() == Activation::Active
    }

    /// Number of results waiting for an active client.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of buffered results dropped because the buffer was full.
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }

    /// Number of own launches whose result has not reached this listener yet.
    pub fn in_flight(&self) -> usize {
        let state = self.state.lock();
        state.untagged.len() + state.tagged.values().filter(|e| !e.received).count()
    }

    /// Launches `operation` asynchronously and returns its launch id.
    pub fn launch<O: Operation>(&self, operation: O, broadcast: bool) -> LaunchId {
        let mut state = self.state.lock();
        let id = self.engine.run_async(operation, broadcast);
        state.untagged.insert(id);
        tracing::debug!(listener = %self.id, launch = %id, broadcast, "launched");
        id
    }

    /// Launches `operation` under `tag` unless a launch with that tag is still running.
    ///
    /// Returns the running launch's id in the latter case.
    pub fn launch_tagged<O: Operation>(
        &self,
        operation: O,
        tag: &str,
        broadcast: bool,
    ) -> LaunchId {
        let mut state = self.state.lock();
        if let Some(entry) = state.tagged.get(tag) {
            if self.engine.registry().is_running(entry.id) {
                tracing::debug!(listener = %self.id, tag, launch = %entry.id, "tag already running");
                return entry.id;
            }
        }

        let id = self.engine.run_async(operation, broadcast);
        let previous = state
            .tagged
            .insert(tag.to_string(), TagEntry { id, received: false });
        if let Some(prev) = previous.filter(|p| !p.received) {
            // Finished but not yet taken in: still ours.
            state.untagged.insert(prev.id);
        }
        tracing::debug!(listener = %self.id, tag, launch = %id, broadcast, "launched");
        id
    }

    /// Cancels one of this listener's launches.
    ///
    /// Returns `false` if the id is not this listener's or is no longer running.
    pub fn cancel(&self, id: LaunchId, may_interrupt: bool) -> bool {
        if !self.state.lock().owns(id) {
            tracing::debug!(listener = %self.id, launch = %id, "cancel of foreign launch refused");
            return false;
        }
        let cancelled = self.engine.registry().cancel(id, may_interrupt);
        if cancelled {
            self.state.lock().forget(id);
        }
        cancelled
    }

    /// Drops own-launch records for ids cancelled behind this listener's back.
    ///
    /// An interrupted worker publishes nothing, so intake never sees these ids.
    pub(crate) fn forget_cancelled(&self, ids: &[LaunchId]) {
        let mut state = self.state.lock();
        for &id in ids {
            state.forget(id);
        }
    }

    /// Cancels the launch currently recorded under `tag`.
    pub fn cancel_tag(&self, tag: &str, may_interrupt: bool) -> bool {
        let id = self.state.lock().tagged.get(tag).map(|e| e.id);
        match id {
            Some(id) => self.cancel(id, may_interrupt),
            None => false,
        }
    }

    /// True while the launch is scheduled and neither finished nor cancelled.
    pub fn is_running(&self, id: LaunchId) -> bool {
        self.engine.registry().is_running(id)
    }

    pub fn is_tag_running(&self, tag: &str) -> bool {
        let id = self.state.lock().tagged.get(tag).map(|e| e.id);
        id.is_some_and(|id| self.engine.registry().is_running(id))
    }

    fn intake(&self, result: Arc<OperationResult>) {
        let id = result.id();
        {
            let mut state = self.state.lock();
            if result.is_cancelled() || self.engine.registry().is_cancelled(id) {
                state.forget(id);
                tracing::trace!(listener = %self.id, launch = %id, "cancelled result dropped");
                return;
            }
            let Some(mode) = state.classify(&result) else {
                return;
            };

            state.pending.push_back(Pending { result, mode });
            if let Some(limit) = self.pending_limit {
                while state.pending.len() > limit {
                    if let Some(old) = state.pending.pop_front() {
                        state.evicted += 1;
                        tracing::warn!(
                            listener = %self.id,
                            launch = %old.result.id(),
                            limit,
                            "pending buffer full, oldest result dropped"
                        );
                    }
                }
            }
            if state.activation == Activation::Inactive {
                tracing::debug!(
                    listener = %self.id,
                    launch = %id,
                    pending = state.pending.len(),
                    "result buffered"
                );
            }
        }
        self.drain();
    }

    fn drain(&self) {
        while let Some((sink, next)) = self.next_delivery() {
            self.deliver(&sink, &next);
        }
    }

    /// Pops the next buffered result if the client can take it right now.
    fn next_delivery(&self) -> Option<(Arc<ResultSink>, Pending)> {
        let mut state = self.state.lock();
        if state.activation != Activation::Active {
            return None;
        }
        let sink = state.live_sink()?;
        let next = state.pending.pop_front()?;
        Some((sink, next))
    }

    fn deliver(&self, sink: &ResultSink, pending: &Pending) {
        let result = &pending.result;
        match sink.dispatch(result, pending.mode) {
            Ok(()) => {}
            Err(err @ DeliveryError::NoHandler { .. }) if pending.mode == DeliveryMode::Normal => {
                tracing::warn!(
                    listener = %self.id,
                    sink = sink.name(),
                    launch = %result.id(),
                    operation = result.operation_name(),
                    error = %err,
                    "own result has no handler"
                );
            }
            Err(DeliveryError::NoHandler { .. }) => {
                tracing::trace!(listener = %self.id, launch = %result.id(), "broadcast not handled");
            }
            Err(err) => {
                tracing::warn!(
                    listener = %self.id,
                    sink = sink.name(),
                    launch = %result.id(),
                    error = %err,
                    label = err.as_label(),
                    "result handler failed"
                );
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("activation", &state.activation)
            .field("tagged", &state.tagged.len())
            .field("untagged", &state.untagged.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Delivery task of one listener.
async fn deliver_loop(
    listener: Weak<Listener>,
    flush: Arc<Notify>,
    mut rx: mpsc::UnboundedReceiver<Arc<OperationResult>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = flush.notified() => match listener.upgrade() {
                Some(this) => this.drain(),
                None => break,
            },
            received = rx.recv() => match (received, listener.upgrade()) {
                (Some(result), Some(this)) => this.intake(result),
                _ => break,
            },
        }
    }
    tracing::trace!("listener delivery task stopped");
}
