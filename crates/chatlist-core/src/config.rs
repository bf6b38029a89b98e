use serde::{Deserialize, Serialize};

use crate::constants;
use crate::remote::StorePath;

/// Names of the roots, folders and fields of the remote schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSchema {
    pub roster_root: String,
    pub messages_root: String,
    pub conversation_meta_root: String,
    pub users_root: String,
    pub last_message_pointer_folder: String,
    pub badge_count_field: String,
    pub name_field: String,
    pub thumbnail_url_field: String,
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self {
            roster_root: constants::ROSTER_ROOT.to_string(),
            messages_root: constants::MESSAGES_ROOT.to_string(),
            conversation_meta_root: constants::CONVERSATION_META_ROOT.to_string(),
            users_root: constants::USERS_ROOT.to_string(),
            last_message_pointer_folder: constants::LAST_MESSAGE_POINTER_FOLDER.to_string(),
            badge_count_field: constants::FIELD_BADGE_COUNT.to_string(),
            name_field: constants::FIELD_NAME.to_string(),
            thumbnail_url_field: constants::FIELD_THUMBNAIL_URL.to_string(),
        }
    }
}

impl StoreSchema {
    // ===== Paths =====

    pub fn roster(&self, user_id: &str) -> StorePath {
        StorePath::from_segments([self.roster_root.as_str(), user_id])
    }

    /// Deleting this path is how a conversation is deleted remotely.
    pub fn roster_entry(&self, user_id: &str, partner_id: &str) -> StorePath {
        self.roster(user_id).child(partner_id)
    }

    pub fn last_message_pointers(&self, user_id: &str, partner_id: &str) -> StorePath {
        self.roster_entry(user_id, partner_id)
            .child(&self.last_message_pointer_folder)
    }

    pub fn message(&self, message_id: &str) -> StorePath {
        StorePath::from_segments([self.messages_root.as_str(), message_id])
    }

    pub fn conversation_meta(&self, user_id: &str, partner_id: &str) -> StorePath {
        StorePath::from_segments([self.conversation_meta_root.as_str(), user_id, partner_id])
    }

    pub fn user(&self, partner_id: &str) -> StorePath {
        StorePath::from_segments([self.users_root.as_str(), partner_id])
    }
}

/// Engine configuration for one signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub current_user_id: String,
    #[serde(default)]
    pub schema: StoreSchema,
}

impl SyncConfig {
    pub fn new(current_user_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            schema: StoreSchema::default(),
        }
    }

    pub fn with_schema(mut self, schema: StoreSchema) -> Self {
        self.schema = schema;
        self
    }
}
