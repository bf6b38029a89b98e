use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::engine::EngineEvent;
use super::subscriptions::{SubscriptionKey, SubscriptionRegistry};
use crate::config::{StoreSchema, SyncConfig};
use crate::error::SyncError;
use crate::models::{ChatMetaData, Conversation, Message, ProfileField, UserProfile};
use crate::remote::{RemoteStore, Snapshot};

/// Result of a one-shot profile fetch, carrying everything needed for the merge.
#[derive(Debug)]
pub struct ProfileFetch {
    pub partner_id: String,
    pub generation: u64,
    pub message: Message,
    pub metadata: Option<ChatMetaData>,
    pub result: Result<UserProfile, SyncError>,
}

impl ProfileFetch {
    pub fn into_conversation(self) -> Result<Conversation, SyncError> {
        let user = self.result?;
        Ok(Conversation::new(user, self.message, self.metadata))
    }
}

/// Resolves profiles once per merge and follows `name`/`thumbnailUrl` changes.
#[derive(Debug, Default)]
pub struct ProfileResolver {
    generations: HashMap<String, u64>,
}

impl ProfileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the partner's profile; the result comes back as `EngineEvent::ProfileFetched`.
    pub(crate) fn request(
        &mut self,
        partner_id: &str,
        message: Message,
        metadata: Option<ChatMetaData>,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        events: &UnboundedSender<EngineEvent>,
    ) -> u64 {
        let generation = self.generations.entry(partner_id.to_string()).or_insert(0);
        *generation += 1;
        let generation = *generation;

        let path = config.schema.user(partner_id);
        let fetch = remote.get_once(&path);
        let schema = config.schema.clone();
        let partner_id = partner_id.to_string();
        let events = events.clone();

        tokio::spawn(async move {
            let result = fetch.await.and_then(|snapshot| {
                UserProfile::from_value(&partner_id, &path, &snapshot.value, &schema)
            });
            let _ = events.send(EngineEvent::ProfileFetched(ProfileFetch {
                partner_id,
                generation,
                message,
                metadata,
                result,
            }));
        });

        generation
    }

    /// Subscribe to field changes unless already following this partner.
    pub fn follow_fields(
        &self,
        partner_id: &str,
        config: &SyncConfig,
        remote: &Arc<dyn RemoteStore>,
        registry: &mut SubscriptionRegistry,
    ) {
        let key = SubscriptionKey::ProfileFields(partner_id.to_string());
        if registry.contains(&key) {
            return;
        }
        let path = config.schema.user(partner_id);
        registry.subscribe(key, || remote.subscribe_child_changed(&path));
    }

    /// Whether `fetch` is the newest request for its partner.
    pub fn is_latest(&self, fetch: &ProfileFetch) -> bool {
        self.generations.get(&fetch.partner_id) == Some(&fetch.generation)
    }

    /// Map a child-changed snapshot to a followed field. Other fields are ignored.
    pub fn field_change(
        snapshot: &Snapshot,
        schema: &StoreSchema,
    ) -> Option<(ProfileField, Option<String>)> {
        let field = ProfileField::from_key(&snapshot.key, schema)?;
        Some((field, snapshot.value.as_str().map(str::to_string)))
    }

    /// Make in-flight fetches for the partner stale. Generations never restart,
    /// so a fetch from before a delete cannot match a request made after re-adding.
    pub fn forget(&mut self, partner_id: &str) {
        if let Some(generation) = self.generations.get_mut(partner_id) {
            *generation += 1;
        }
    }
}
