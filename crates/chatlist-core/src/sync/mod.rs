pub(crate) mod engine;
pub mod initial_load;
pub mod message_resolver;
pub mod metadata_resolver;
pub mod notification;
pub mod profile_resolver;
pub mod roster;
pub mod subscriptions;

pub use initial_load::{InitialLoadCoordinator, LoadPhase};
pub use notification::{NotificationDecision, NotificationPolicy};
pub use subscriptions::{SubscriptionId, SubscriptionKey, SubscriptionRegistry};
