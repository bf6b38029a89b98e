pub mod conversation;
pub mod message;
pub mod metadata;
pub mod profile;
pub mod roster;

pub use conversation::Conversation;
pub use message::{Message, MessageKind};
pub use metadata::ChatMetaData;
pub use profile::{ProfileField, UserProfile};
pub use roster::RosterEntry;
