use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::engine::EngineEvent;
use super::subscriptions::{SubscriptionKey, SubscriptionRegistry};
use crate::config::SyncConfig;
use crate::constants::POINTER_QUERY_LIMIT;
use crate::models::RosterEntry;
use crate::remote::{RemoteStore, Snapshot};

/// Roster membership as seen through child-added/removed notifications.
#[derive(Debug, Default)]
pub struct RosterIngestion {
    members: HashSet<String>,
}

impl RosterIngestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the roster once and follow additions and removals.
    pub(crate) fn start(
        &self,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        registry: &mut SubscriptionRegistry,
        events: &UnboundedSender<EngineEvent>,
    ) {
        let path = config.schema.roster(&config.current_user_id);

        let count = remote.get_once(&path);
        let events = events.clone();
        tokio::spawn(async move {
            let _ = events.send(EngineEvent::RosterCounted(count.await));
        });

        registry.subscribe(SubscriptionKey::RosterAdded, || {
            remote.subscribe_child_added(&path)
        });
        registry.subscribe(SubscriptionKey::RosterRemoved, || {
            remote.subscribe_child_removed(&path)
        });
    }

    /// Record an added child and follow its last-message pointer.
    ///
    /// Returns the entry and whether the partner was already a member.
    pub fn added(
        &mut self,
        snapshot: &Snapshot,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        registry: &mut SubscriptionRegistry,
    ) -> Option<(RosterEntry, bool)> {
        let entry = RosterEntry::from_snapshot(snapshot)?;
        let known = !self.members.insert(entry.partner_id.clone());

        let path = config
            .schema
            .last_message_pointers(&config.current_user_id, &entry.partner_id);
        registry.subscribe(SubscriptionKey::Pointer(entry.partner_id.clone()), || {
            remote.subscribe_last_children(&path, POINTER_QUERY_LIMIT)
        });
        Some((entry, known))
    }

    pub fn removed(&mut self, snapshot: &Snapshot) -> Option<RosterEntry> {
        let entry = RosterEntry::from_snapshot(snapshot)?;
        self.members.remove(&entry.partner_id);
        Some(entry)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, partner_id: &str) -> bool {
        self.members.contains(partner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_added_follows_pointer_and_tracks_membership() {
        let store = MemoryStore::with_tree(json!({
            "roster": {"me": {"bob": {"lastMessagePointer": {"m1": true}}}}
        }));
        let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut registry = SubscriptionRegistry::new(tx);
        let config = SyncConfig::new("me");
        let mut roster = RosterIngestion::new();

        let snapshot = Snapshot::new("bob", json!({"lastMessagePointer": {"m1": true}}));
        let (entry, known) = roster
            .added(&snapshot, &config, &remote, &mut registry)
            .unwrap();
        assert_eq!(entry.partner_id, "bob");
        assert!(!known);
        assert!(roster.contains("bob"));
        assert!(registry.contains(&SubscriptionKey::Pointer("bob".into())));
        assert_eq!(store.subscriber_count("roster/me/bob/lastMessagePointer"), 1);

        let (_, known) = roster
            .added(&snapshot, &config, &remote, &mut registry)
            .unwrap();
        assert!(known);
        assert_eq!(registry.len(), 1);

        roster.removed(&Snapshot::new("bob", json!({})));
        assert!(!roster.contains("bob"));
    }
}
