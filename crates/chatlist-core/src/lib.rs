//! Conversation list synchronization engine.
//!
//! Resolves roster entries, last-message pointers, message records, per-conversation
//! metadata and partner profiles from a realtime hierarchical store into one ordered,
//! deduplicated list of conversations.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod runtime;
pub mod search;
pub mod stats;
pub mod store;
pub mod sync;

pub use config::{StoreSchema, SyncConfig};
pub use error::SyncError;
pub use events::{BadgeSink, ConversationListener, ListSnapshot, NoopBadgeSink, NoopListener};
pub use models::{ChatMetaData, Conversation, Message, MessageKind, RosterEntry, UserProfile};
pub use remote::{MemoryStore, Reachability, RemoteStore, SharedReachability, Snapshot, StorePath};
pub use runtime::{SyncHandle, SyncRuntime};
pub use stats::{SharedSyncStats, StreamKind, SyncStats};
pub use store::{BadgeCounter, ConversationStore};
pub use sync::{LoadPhase, NotificationDecision};
