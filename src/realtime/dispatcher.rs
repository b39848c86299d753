//! Listener registries for realtime events, state changes and errors.
//!
//! Listeners run synchronously on the connection task. A panicking listener
//! is caught and logged; the remaining listeners still run. Long-running work
//! belongs on a separate task spawned by the listener itself.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::realtime::error::RealtimeError;
use crate::realtime::types::{ConnectionState, RealtimeEvent};

/// Callback for inbound domain events
pub type EventListener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Callback for connection state transitions
pub type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Callback for background errors (malformed frames, failed resubscribes, closes)
pub type ErrorListener = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Event,
    State,
    Error,
}

/// Fans out notifications to registered listeners.
#[derive(Default)]
pub struct EventDispatcher {
    next_id: AtomicU64,
    events: RwLock<BTreeMap<u64, EventListener>>,
    states: RwLock<BTreeMap<u64, StateListener>>,
    errors: RwLock<BTreeMap<u64, ErrorListener>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.events.read().len())
            .field("states", &self.states.read().len())
            .field("errors", &self.errors.read().len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event<F>(self: &Arc<Self>, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.events.write().insert(id, Arc::new(listener));
        self.handle(ListenerKind::Event, id)
    }

    pub fn on_state_change<F>(self: &Arc<Self>, listener: F) -> ListenerHandle
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.states.write().insert(id, Arc::new(listener));
        self.handle(ListenerKind::State, id)
    }

    pub fn on_error<F>(self: &Arc<Self>, listener: F) -> ListenerHandle
    where
        F: Fn(&RealtimeError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.errors.write().insert(id, Arc::new(listener));
        self.handle(ListenerKind::Error, id)
    }

    /// Drop every registered listener.
    pub fn remove_all(&self) {
        // Hold all three locks so no emit observes a half-cleared state.
        let mut events = self.events.write();
        let mut states = self.states.write();
        let mut errors = self.errors.write();
        events.clear();
        states.clear();
        errors.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.events.read().len() + self.states.read().len() + self.errors.read().len()
    }

    pub fn emit_event(&self, event: &RealtimeEvent) {
        let listeners: Vec<EventListener> = self.events.read().values().cloned().collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(event_id = %event.id, "Event listener panicked");
            }
        }
    }

    pub fn emit_state(&self, state: ConnectionState) {
        let listeners: Vec<StateListener> = self.states.read().values().cloned().collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                tracing::error!(state = %state, "State listener panicked");
            }
        }
    }

    pub fn emit_error(&self, error: &RealtimeError) {
        let listeners: Vec<ErrorListener> = self.errors.read().values().cloned().collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(error))).is_err() {
                tracing::error!(error = %error, "Error listener panicked");
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn handle(self: &Arc<Self>, kind: ListenerKind, id: u64) -> ListenerHandle {
        ListenerHandle {
            dispatcher: Arc::downgrade(self),
            kind,
            id,
        }
    }

    fn remove(&self, kind: ListenerKind, id: u64) -> bool {
        match kind {
            ListenerKind::Event => self.events.write().remove(&id).is_some(),
            ListenerKind::State => self.states.write().remove(&id).is_some(),
            ListenerKind::Error => self.errors.write().remove(&id).is_some(),
        }
    }
}

/// Deregistration handle returned by `on_*`. Dropping it keeps the listener.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    dispatcher: Weak<EventDispatcher>,
    kind: ListenerKind,
    id: u64,
}

impl ListenerHandle {
    /// Remove the listener. Returns `false` if it was already gone.
    pub fn remove(&self) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|dispatcher| dispatcher.remove(self.kind, self.id))
    }
}
