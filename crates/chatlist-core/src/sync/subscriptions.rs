use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::engine::EngineEvent;
use crate::remote::SnapshotStream;

/// What a live subscription observes. At most one subscription exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    RosterAdded,
    RosterRemoved,
    Pointer(String),
    Message(String),
    Metadata(String),
    ProfileFields(String),
}

impl SubscriptionKey {
    /// Partner a per-partner subscription belongs to
    pub fn partner_id(&self) -> Option<&str> {
        match self {
            Self::RosterAdded | Self::RosterRemoved => None,
            Self::Pointer(p) | Self::Message(p) | Self::Metadata(p) | Self::ProfileFields(p) => {
                Some(p)
            }
        }
    }
}

/// Token identifying one subscription instance. Replaced subscriptions get a new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ActiveSubscription {
    id: SubscriptionId,
    task: JoinHandle<()>,
}

/// Owns every forwarding task the engine has opened.
///
/// Each task drains one remote stream into the engine queue, tagging deliveries with its
/// key and token. Events still queued from a cancelled or replaced subscription fail
/// `is_current` and are dropped by the engine.
pub struct SubscriptionRegistry {
    next_id: u64,
    active: HashMap<SubscriptionKey, ActiveSubscription>,
    events: UnboundedSender<EngineEvent>,
}

impl SubscriptionRegistry {
    pub(crate) fn new(events: UnboundedSender<EngineEvent>) -> Self {
        Self {
            next_id: 0,
            active: HashMap::new(),
            events,
        }
    }

    /// Replace the subscription for `key`. The previous one is disposed before `open` runs.
    pub fn subscribe<F>(&mut self, key: SubscriptionKey, open: F) -> SubscriptionId
    where
        F: FnOnce() -> SnapshotStream,
    {
        self.cancel(&key);

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let mut stream = open();
        let events = self.events.clone();
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let failed = result.is_err();
                let delivery = EngineEvent::Delivery {
                    key: task_key.clone(),
                    id,
                    result,
                };
                if events.send(delivery).is_err() || failed {
                    break;
                }
            }
        });

        self.active.insert(key, ActiveSubscription { id, task });
        id
    }

    pub fn is_current(&self, key: &SubscriptionKey, id: SubscriptionId) -> bool {
        self.active.get(key).is_some_and(|sub| sub.id == id)
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn cancel(&mut self, key: &SubscriptionKey) -> bool {
        match self.active.remove(key) {
            Some(sub) => {
                sub.task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every subscription owned for one partner.
    pub fn cancel_partner(&mut self, partner_id: &str) -> usize {
        let keys: Vec<SubscriptionKey> = self
            .active
            .keys()
            .filter(|key| key.partner_id() == Some(partner_id))
            .cloned()
            .collect();
        for key in &keys {
            self.cancel(key);
        }
        keys.len()
    }

    pub fn cancel_all(&mut self) {
        let count = self.active.len();
        for (_, sub) in self.active.drain() {
            sub.task.abort();
        }
        if count > 0 {
            debug!("Disposed {} subscriptions", count);
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
