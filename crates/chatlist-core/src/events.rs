use crate::error::SyncError;
use crate::models::Conversation;
use crate::sync::NotificationDecision;

/// The two list projections published after every store mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshot {
    /// All conversations, newest message first
    pub visible: Vec<Conversation>,
    /// `visible` restricted to the active filter
    pub filtered: Vec<Conversation>,
}

impl ListSnapshot {
    pub fn partner_ids(&self) -> Vec<&str> {
        self.visible.iter().map(Conversation::partner_id).collect()
    }

    pub fn filtered_names(&self) -> Vec<Option<&str>> {
        self.filtered.iter().map(|c| c.user.name.as_deref()).collect()
    }
}

/// Signals delivered to the conversation-list screen.
///
/// Callbacks run on the engine task and must not block.
pub trait ConversationListener: Send + Sync {
    fn on_initial_load_finished(&self) {}
    fn on_empty_state_changed(&self, _is_empty: bool) {}
    fn on_list_changed(&self, _snapshot: &ListSnapshot) {}
    /// `None` clears the tab badge
    fn on_badge_changed(&self, _count: Option<usize>) {}
    fn on_notification_decision(&self, _decision: NotificationDecision, _message_from: &str) {}
    fn on_loading_changed(&self, _loading: bool) {}
    fn on_delete_failed(&self, _partner_id: &str, _error: &SyncError) {}
    fn on_transport_error(&self, _error: &SyncError) {}
}

/// OS-level application badge.
pub trait BadgeSink: Send + Sync {
    fn set_badge(&self, count: Option<usize>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ConversationListener for NoopListener {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBadgeSink;

impl BadgeSink for NoopBadgeSink {
    fn set_badge(&self, _count: Option<usize>) {}
}
