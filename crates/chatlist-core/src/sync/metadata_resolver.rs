use std::collections::HashMap;
use std::sync::Arc;

use super::subscriptions::{SubscriptionKey, SubscriptionRegistry};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::{ChatMetaData, Message};
use crate::remote::{RemoteStore, Snapshot};

/// One always-latest metadata subscription per partner.
#[derive(Debug, Default)]
pub struct MetadataResolver {
    /// Latest resolved message waiting to be paired with metadata
    messages: HashMap<String, Message>,
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `message` with the partner's metadata, re-subscribing from scratch.
    pub fn repoint(
        &mut self,
        partner_id: &str,
        message: Message,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        registry: &mut SubscriptionRegistry,
    ) {
        self.messages.insert(partner_id.to_string(), message);
        let path = config
            .schema
            .conversation_meta(&config.current_user_id, partner_id);
        registry.subscribe(SubscriptionKey::Metadata(partner_id.to_string()), || {
            remote.subscribe_value(&path)
        });
    }

    pub fn resolve(
        &self,
        partner_id: &str,
        snapshot: &Snapshot,
        config: &SyncConfig,
    ) -> Result<(Message, Option<ChatMetaData>), SyncError> {
        let message = self
            .messages
            .get(partner_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                partner_id: partner_id.to_string(),
            })?;
        let path = config
            .schema
            .conversation_meta(&config.current_user_id, partner_id);
        let metadata =
            ChatMetaData::from_value(&path, &snapshot.value, &config.schema.badge_count_field)?;
        Ok((message, metadata))
    }

    pub fn forget(&mut self, partner_id: &str) {
        self.messages.remove(partner_id);
    }
}
