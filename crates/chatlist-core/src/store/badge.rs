use crate::models::Conversation;

/// Derives the unread badge from the canonical conversations.
#[derive(Debug, Clone)]
pub struct BadgeCounter {
    current_user_id: String,
    last_reported: Option<Option<usize>>,
}

impl BadgeCounter {
    pub fn new(current_user_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            last_reported: None,
        }
    }

    /// Number of unread incoming conversations; `None` when there are none.
    pub fn recompute(conversations: &[Conversation], current_user_id: &str) -> Option<usize> {
        let count = conversations
            .iter()
            .filter(|c| c.is_unread_for(current_user_id))
            .count();
        (count > 0).then_some(count)
    }

    /// Recompute and return the value if it differs from the last one reported.
    pub fn update(&mut self, conversations: &[Conversation]) -> Option<Option<usize>> {
        let badge = Self::recompute(conversations, &self.current_user_id);
        if self.last_reported == Some(badge) {
            return None;
        }
        self.last_reported = Some(badge);
        Some(badge)
    }

    pub fn current(&self) -> Option<usize> {
        self.last_reported.flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, UserProfile};

    fn make_test_conversation(partner: &str, from_id: &str, seen: Option<bool>) -> Conversation {
        let message = Message {
            id: format!("m-{}", partner),
            from_id: from_id.to_string(),
            to_id: None,
            text: None,
            image_url: None,
            video_url: None,
            voice_data: None,
            timestamp: 1,
            seen,
        };
        Conversation::new(UserProfile::new(partner), message, None)
    }

    #[test]
    fn test_recompute_counts_unread_incoming() {
        let conversations = vec![
            make_test_conversation("a", "a", Some(false)),
            make_test_conversation("b", "b", Some(true)),
            make_test_conversation("c", "me", Some(false)),
            make_test_conversation("d", "d", None),
            make_test_conversation("e", "e", Some(false)),
        ];
        assert_eq!(BadgeCounter::recompute(&conversations, "me"), Some(2));
    }

    #[test]
    fn test_zero_clears() {
        let conversations = vec![make_test_conversation("b", "b", Some(true))];
        assert_eq!(BadgeCounter::recompute(&conversations, "me"), None);
        assert_eq!(BadgeCounter::recompute(&[], "me"), None);
    }

    #[test]
    fn test_update_reports_changes_only() {
        let mut counter = BadgeCounter::new("me");
        assert_eq!(counter.update(&[]), Some(None));
        assert_eq!(counter.update(&[]), None);

        let unread = vec![make_test_conversation("a", "a", Some(false))];
        assert_eq!(counter.update(&unread), Some(Some(1)));
        assert_eq!(counter.current(), Some(1));
        assert_eq!(counter.update(&unread), None);
        assert_eq!(counter.update(&[]), Some(None));
    }
}
