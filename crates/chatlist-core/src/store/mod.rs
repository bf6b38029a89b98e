pub mod badge;
pub mod conversation_store;

pub use badge::BadgeCounter;
pub use conversation_store::{ConversationStore, MergeOutcome};
