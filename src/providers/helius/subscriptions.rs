//! Subscription table for pending signature monitors.
//!
//! Entries are keyed by the local request id until the vendor acknowledges them,
//! then moved under the server-assigned id. An entry is never reachable under both.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::providers::types::{MonitorOutcome, ProviderResult};

/// Address of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Client-chosen request id, before acknowledgment.
    Local(u64),
    /// Server-assigned subscription id, after acknowledgment.
    Remote(u64),
}

pub type Responder = oneshot::Sender<ProviderResult<MonitorOutcome>>;

/// A pending monitor for one signature.
#[derive(Debug)]
pub struct Subscription {
    pub local_id: u64,
    pub signature: String,
    responder: Responder,
    timer: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(local_id: u64, signature: impl Into<String>, responder: Responder) -> Self {
        Self {
            local_id,
            signature: signature.into(),
            responder,
            timer: None,
        }
    }

    pub fn set_timer(&mut self, timer: JoinHandle<()>) {
        self.timer = Some(timer);
    }

    /// Deliver the result to the waiter and cancel the timeout.
    ///
    /// Consumes the entry, so a subscription can settle at most once.
    pub fn settle(self, result: ProviderResult<MonitorOutcome>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        if self.responder.send(result).is_err() {
            tracing::debug!(
                signature = %self.signature,
                local_id = self.local_id,
                "Monitor caller went away before settlement"
            );
        }
    }
}

/// Result of moving an entry under its server id.
#[derive(Debug)]
pub enum Promotion {
    Promoted,
    /// The server id was already in use; the older entry was evicted and must be settled.
    Displaced(Subscription),
    /// No entry waits on that local id (already settled).
    Unknown,
}

/// Pending subscriptions of one provider instance.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: HashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new subscription under its local id.
    pub fn insert(&mut self, subscription: Subscription) -> SubscriptionKey {
        let key = SubscriptionKey::Local(subscription.local_id);
        self.entries.insert(key, subscription);
        key
    }

    /// Move an entry from its local id to the server id.
    pub fn promote(&mut self, local_id: u64, server_id: u64) -> Promotion {
        match self.entries.remove(&SubscriptionKey::Local(local_id)) {
            Some(subscription) => match self
                .entries
                .insert(SubscriptionKey::Remote(server_id), subscription)
            {
                Some(displaced) => Promotion::Displaced(displaced),
                None => Promotion::Promoted,
            },
            None => Promotion::Unknown,
        }
    }

    pub fn take(&mut self, key: SubscriptionKey) -> Option<Subscription> {
        self.entries.remove(&key)
    }

    /// Remove an entry by local id, whichever key it currently lives under.
    pub fn take_by_local_id(&mut self, local_id: u64) -> Option<Subscription> {
        let key = self
            .entries
            .iter()
            .find(|(_, sub)| sub.local_id == local_id)
            .map(|(key, _)| *key)?;
        self.entries.remove(&key)
    }

    pub fn key_of(&self, local_id: u64) -> Option<SubscriptionKey> {
        self.entries
            .iter()
            .find(|(_, sub)| sub.local_id == local_id)
            .map(|(key, _)| *key)
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> Vec<Subscription> {
        self.entries.drain().map(|(_, sub)| sub).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
