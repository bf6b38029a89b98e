use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::subscriptions::{SubscriptionKey, SubscriptionRegistry};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::Message;
use crate::remote::{RemoteStore, Snapshot};

/// Follows the message a partner's last-message pointer names.
#[derive(Debug, Default)]
pub struct MessageResolver {
    /// partner id -> followed message id
    pointed: HashMap<String, String>,
    /// Partners whose followed message has not emitted yet
    awaiting: HashSet<String>,
}

impl MessageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `message_id` for `partner_id`, replacing the previous message.
    /// Returns false if that message is already followed.
    pub fn point(
        &mut self,
        partner_id: &str,
        message_id: &str,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        registry: &mut SubscriptionRegistry,
    ) -> bool {
        let key = SubscriptionKey::Message(partner_id.to_string());
        if self.pointed.get(partner_id).map(String::as_str) == Some(message_id)
            && registry.contains(&key)
        {
            return false;
        }

        let path = config.schema.message(message_id);
        registry.subscribe(key, || remote.subscribe_value(&path));
        self.pointed
            .insert(partner_id.to_string(), message_id.to_string());
        self.awaiting.insert(partner_id.to_string());
        true
    }

    pub fn is_awaiting(&self, partner_id: &str) -> bool {
        self.awaiting.contains(partner_id)
    }

    /// Decode one emission of the followed message.
    pub fn resolve(
        &mut self,
        partner_id: &str,
        snapshot: &Snapshot,
        config: &SyncConfig,
    ) -> Result<Message, SyncError> {
        self.awaiting.remove(partner_id);
        let path = config.schema.message(&snapshot.key);
        if !snapshot.exists() {
            return Err(SyncError::NotFound {
                partner_id: partner_id.to_string(),
            });
        }
        Message::from_value(&snapshot.key, &path, &snapshot.value)
    }

    pub fn forget(&mut self, partner_id: &str) {
        self.pointed.remove(partner_id);
        self.awaiting.remove(partner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_resolve_decodes_and_rejects() {
        let mut resolver = MessageResolver::new();
        let config = SyncConfig::new("me");

        let ok = Snapshot::new("m1", json!({"fromId": "bob", "timestamp": 5}));
        assert_eq!(resolver.resolve("bob", &ok, &config).unwrap().id, "m1");

        let gone = Snapshot::new("m1", Value::Null);
        assert!(matches!(
            resolver.resolve("bob", &gone, &config),
            Err(SyncError::NotFound { .. })
        ));

        let bad = Snapshot::new("m1", json!({"text": "no sender"}));
        assert!(matches!(
            resolver.resolve("bob", &bad, &config),
            Err(SyncError::MalformedRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_point_awaits_first_emission() {
        let remote: Arc<dyn RemoteStore> = Arc::new(crate::remote::MemoryStore::new());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut registry = SubscriptionRegistry::new(tx);
        let config = SyncConfig::new("me");
        let mut resolver = MessageResolver::new();

        assert!(resolver.point("bob", "m1", &config, &remote, &mut registry));
        assert!(!resolver.point("bob", "m1", &config, &remote, &mut registry));
        assert!(resolver.is_awaiting("bob"));

        let emitted = Snapshot::new("m1", json!({"fromId": "bob", "timestamp": 5}));
        resolver.resolve("bob", &emitted, &config).unwrap();
        assert!(!resolver.is_awaiting("bob"));

        assert!(resolver.point("bob", "m2", &config, &remote, &mut registry));
        resolver.forget("bob");
        assert!(!resolver.is_awaiting("bob"));
    }
}
