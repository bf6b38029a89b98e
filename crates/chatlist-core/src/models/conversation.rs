use super::{ChatMetaData, Message, UserProfile};

/// One row of the conversation list, keyed by `user.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub user: UserProfile,
    pub message: Message,
    pub metadata: Option<ChatMetaData>,
}

impl Conversation {
    pub fn new(user: UserProfile, message: Message, metadata: Option<ChatMetaData>) -> Self {
        Self {
            user,
            message,
            metadata,
        }
    }

    pub fn partner_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_unread_for(&self, current_user_id: &str) -> bool {
        self.message.is_unread_for(current_user_id)
    }

    /// Per-row badge: shown only for unread incoming messages with a positive count.
    pub fn row_badge(&self, current_user_id: &str) -> Option<u32> {
        if !self.is_unread_for(current_user_id) {
            return None;
        }
        self.metadata
            .map(|meta| meta.badge_count)
            .filter(|count| *count > 0)
    }
}
