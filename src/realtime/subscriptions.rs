//! Subscription tracking for the realtime client.
//!
//! [`SubscriptionRegistry`] holds the *desired* subscriptions and survives
//! reconnects so they can be replayed. [`PendingConfirmations`] pairs each
//! in-flight command with the caller waiting on its confirmation frame.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::realtime::error::{RealtimeError, RealtimeResult};
use crate::realtime::types::{Action, SubscriptionCommand, SubscriptionConfirmation, SubscriptionType};

/// Desired subscription state, mutated before the server acknowledges it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRegistry {
    all: bool,
    channels: BTreeSet<String>,
    event_types: BTreeSet<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_all(&mut self, subscribed: bool) {
        self.all = subscribed;
    }

    pub fn add_channels(&mut self, channels: &[String]) {
        self.channels.extend(channels.iter().cloned());
    }

    pub fn remove_channels(&mut self, channels: &[String]) {
        for channel in channels {
            self.channels.remove(channel);
        }
    }

    pub fn add_event_types(&mut self, event_types: &[String]) {
        self.event_types.extend(event_types.iter().cloned());
    }

    pub fn remove_event_types(&mut self, event_types: &[String]) {
        for event_type in event_types {
            self.event_types.remove(event_type);
        }
    }

    pub fn is_subscribed_to_all(&self) -> bool {
        self.all
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.event_types.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.channels.is_empty() && self.event_types.is_empty()
    }

    /// Commands that restore this state on a fresh connection.
    ///
    /// At most one command per subscription type, each batching every
    /// tracked item.
    pub fn resubscribe_commands(&self) -> Vec<SubscriptionCommand> {
        let mut commands = Vec::new();
        if self.all {
            commands.push(SubscriptionCommand::all(Action::Subscribe));
        }
        if !self.channels.is_empty() {
            commands.push(SubscriptionCommand::channels(Action::Subscribe, self.channels()));
        }
        if !self.event_types.is_empty() {
            commands.push(SubscriptionCommand::event_types(
                Action::Subscribe,
                self.event_types(),
            ));
        }
        commands
    }
}

type ConfirmationKey = (Action, SubscriptionType);
type Responder = oneshot::Sender<RealtimeResult<SubscriptionConfirmation>>;

struct PendingEntry {
    id: u64,
    tx: Responder,
}

#[derive(Default)]
struct PendingState {
    next_id: u64,
    active: HashMap<ConfirmationKey, PendingEntry>,
    // Callers whose key was taken over by a newer command. They only leave
    // via their own timeout.
    superseded: HashMap<u64, Responder>,
}

/// Tracks subscription commands awaiting a confirmation frame.
///
/// At most one command per `(action, subscription_type)` is matched at a
/// time; a newer command with the same key takes over matching and the older
/// caller runs into its timeout.
#[derive(Default)]
pub struct PendingConfirmations {
    state: Mutex<PendingState>,
}

impl std::fmt::Debug for PendingConfirmations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConfirmations")
            .field("len", &self.len())
            .finish()
    }
}

impl PendingConfirmations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `key`. Must happen before the command is sent.
    pub fn register(self: &Arc<Self>, key: ConfirmationKey) -> PendingConfirmation {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        if let Some(previous) = state.active.insert(key, PendingEntry { id, tx }) {
            tracing::debug!(
                action = ?key.0,
                subscription_type = ?key.1,
                "Pending confirmation superseded by a newer command"
            );
            state.superseded.insert(previous.id, previous.tx);
        }

        PendingConfirmation {
            key,
            id,
            rx,
            owner: Arc::clone(self),
        }
    }

    /// Resolve the waiter for `confirmation`'s key. Returns `false` if none matched.
    pub fn confirm(&self, confirmation: SubscriptionConfirmation) -> bool {
        let entry = self.state.lock().active.remove(&confirmation.key());
        match entry {
            Some(entry) => {
                let _ = entry.tx.send(Ok(confirmation));
                true
            }
            None => false,
        }
    }

    /// Reject the waiter for `key`. Returns `false` if none matched.
    pub fn reject(&self, key: ConfirmationKey, error: RealtimeError) -> bool {
        let entry = self.state.lock().active.remove(&key);
        match entry {
            Some(entry) => {
                let _ = entry.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Number of callers still waiting, including superseded ones.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.active.len() + state.superseded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: ConfirmationKey, id: u64) {
        let mut state = self.state.lock();
        if state.active.get(&key).is_some_and(|entry| entry.id == id) {
            state.active.remove(&key);
        } else {
            state.superseded.remove(&id);
        }
    }
}

/// A registered waiter. Dropping it (on timeout or cancellation) removes its
/// tracking entry.
#[derive(Debug)]
pub struct PendingConfirmation {
    key: ConfirmationKey,
    id: u64,
    rx: oneshot::Receiver<RealtimeResult<SubscriptionConfirmation>>,
    owner: Arc<PendingConfirmations>,
}

impl PendingConfirmation {
    pub fn key(&self) -> ConfirmationKey {
        self.key
    }

    /// Wait for the matching confirmation frame, bounded by `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> RealtimeResult<SubscriptionConfirmation> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RealtimeError::Protocol(
                "Confirmation tracker dropped".to_string(),
            )),
            Err(_) => {
                tracing::debug!(
                    action = ?self.key.0,
                    subscription_type = ?self.key.1,
                    "Subscription confirmation timed out"
                );
                Err(RealtimeError::SubscriptionTimeout)
            }
        }
    }
}

impl Drop for PendingConfirmation {
    fn drop(&mut self) {
        self.owner.remove(self.key, self.id);
    }
}
