use crate::models::Message;

/// Whether an in-app sound/vibration may be played for a resolved message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    Play,
    Suppress,
}

impl NotificationDecision {
    pub fn should_play(self) -> bool {
        self == Self::Play
    }
}

/// Inputs to the in-app notification decision.
#[derive(Debug, Clone)]
pub struct NotificationPolicy {
    current_user_id: String,
    /// Pointed or pushed messages not yet resolved
    unhandled: i64,
    app_just_became_active: bool,
    list_visible: bool,
}

impl NotificationPolicy {
    pub fn new(current_user_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            unhandled: 0,
            app_just_became_active: false,
            list_visible: true,
        }
    }

    pub fn unhandled(&self) -> i64 {
        self.unhandled
    }

    /// A new last message was pointed at and is still to be resolved.
    pub fn inbound_received(&mut self) {
        self.unhandled += 1;
    }

    /// A pointed message will never be decided on (unreadable or deleted).
    pub fn discard_unhandled(&mut self) {
        self.unhandled = (self.unhandled - 1).max(0);
    }

    pub fn app_became_active(&mut self) {
        self.app_just_became_active = true;
    }

    pub fn set_list_visible(&mut self, visible: bool) {
        self.list_visible = visible;
    }

    /// Decide for one resolved message. While other pointed messages are still
    /// unresolved the decision is deferred to the last of them, so a burst plays once.
    /// The "just became active" flag is consumed by the first decision of a settled burst.
    pub fn decide(&mut self, message: &Message, initial_load_finished: bool) -> NotificationDecision {
        self.unhandled -= 1;
        if self.unhandled > 0 {
            return NotificationDecision::Suppress;
        }
        self.unhandled = 0;

        if std::mem::take(&mut self.app_just_became_active) {
            return NotificationDecision::Suppress;
        }

        let play = self.list_visible
            && initial_load_finished
            && message.from_id != self.current_user_id;

        if play {
            NotificationDecision::Play
        } else {
            NotificationDecision::Suppress
        }
    }
}
