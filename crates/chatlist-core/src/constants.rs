//! Default names of the remote schema.
//!
//! Every name here can be overridden through [`crate::config::StoreSchema`].

// Roots
/// Per-user roster: `roster/{currentUserId}/{partnerId}`
pub const ROSTER_ROOT: &str = "roster";
/// Message records: `messages/{messageId}`
pub const MESSAGES_ROOT: &str = "messages";
/// Per-conversation metadata: `conversationMeta/{currentUserId}/{partnerId}`
pub const CONVERSATION_META_ROOT: &str = "conversationMeta";
/// Partner profiles: `users/{partnerId}`
pub const USERS_ROOT: &str = "users";

/// Folder under a roster entry holding `{messageId: true}` pointers
pub const LAST_MESSAGE_POINTER_FOLDER: &str = "lastMessagePointer";

// Record fields
pub const FIELD_BADGE_COUNT: &str = "badgeCount";
pub const FIELD_NAME: &str = "name";
pub const FIELD_THUMBNAIL_URL: &str = "thumbnailUrl";

/// Only the most recent pointer is followed per roster entry.
pub const POINTER_QUERY_LIMIT: usize = 1;

// Conversation row previews
pub const PREVIEW_IMAGE: &str = "Attachment: Image";
pub const PREVIEW_VIDEO: &str = "Attachment: Video";
pub const PREVIEW_AUDIO: &str = "Audio message";
