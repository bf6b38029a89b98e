use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::initial_load::InitialLoadCoordinator;
use super::message_resolver::MessageResolver;
use super::metadata_resolver::MetadataResolver;
use super::notification::NotificationPolicy;
use super::profile_resolver::{ProfileFetch, ProfileResolver};
use super::roster::RosterIngestion;
use super::subscriptions::{SubscriptionId, SubscriptionKey, SubscriptionRegistry};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{BadgeSink, ConversationListener};
use crate::models::roster::latest_pointer;
use crate::remote::{Reachability, RemoteStore, Snapshot};
use crate::runtime::SyncCommand;
use crate::stats::{SharedSyncStats, StreamKind};
use crate::store::{BadgeCounter, ConversationStore, MergeOutcome};

/// Everything the engine reacts to besides commands.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    /// One emission of a registered subscription
    Delivery {
        key: SubscriptionKey,
        id: SubscriptionId,
        result: Result<Snapshot, SyncError>,
    },
    RosterCounted(Result<Snapshot, SyncError>),
    ProfileFetched(ProfileFetch),
    DeleteFinished {
        partner_id: String,
        result: Result<(), SyncError>,
    },
    InitialLoadFinished,
}

/// Single owner of all list state. Subscriptions only produce events; every mutation
/// happens here, one event at a time.
pub(crate) struct SyncEngine {
    config: SyncConfig,
    remote: Arc<dyn RemoteStore>,
    reachability: Arc<dyn Reachability>,
    listener: Arc<dyn ConversationListener>,
    badge_sink: Arc<dyn BadgeSink>,
    stats: SharedSyncStats,

    events_tx: UnboundedSender<EngineEvent>,
    events_rx: UnboundedReceiver<EngineEvent>,
    subscriptions: SubscriptionRegistry,

    roster: RosterIngestion,
    messages: MessageResolver,
    metadata: MetadataResolver,
    profiles: ProfileResolver,
    coordinator: InitialLoadCoordinator,
    notifications: NotificationPolicy,
    store: ConversationStore,
    badge: BadgeCounter,

    // Published state
    load_finished: bool,
    loading: bool,
    last_empty: Option<bool>,
}

impl SyncEngine {
    pub(crate) fn new(
        config: SyncConfig,
        remote: Arc<dyn RemoteStore>,
        reachability: Arc<dyn Reachability>,
        listener: Arc<dyn ConversationListener>,
        badge_sink: Arc<dyn BadgeSink>,
        stats: SharedSyncStats,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let finished_tx = events_tx.clone();
        let coordinator = InitialLoadCoordinator::new(move || {
            let _ = finished_tx.send(EngineEvent::InitialLoadFinished);
        });

        Self {
            notifications: NotificationPolicy::new(config.current_user_id.clone()),
            badge: BadgeCounter::new(config.current_user_id.clone()),
            config,
            remote,
            reachability,
            listener,
            badge_sink,
            stats,
            subscriptions: SubscriptionRegistry::new(events_tx.clone()),
            events_tx,
            events_rx,
            roster: RosterIngestion::new(),
            messages: MessageResolver::new(),
            metadata: MetadataResolver::new(),
            profiles: ProfileResolver::new(),
            coordinator,
            store: ConversationStore::new(),
            load_finished: false,
            loading: false,
            last_empty: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<SyncCommand>) {
        self.roster.start(
            &self.config,
            &self.remote,
            &mut self.subscriptions,
            &self.events_tx,
        );
        self.publish_badge();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SyncCommand::Shutdown(reply)) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
            self.stats.set_open_subscriptions(self.subscriptions.len());
        }
    }

    fn shutdown(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        info!(
            "Conversation sync shutting down, disposing {} subscriptions",
            self.subscriptions.len()
        );
        self.subscriptions.cancel_all();
    }

    // ===== Commands =====

    fn handle_command(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::SetFilter(text) => {
                self.store.set_filter(&text);
                self.publish_list(false);
            }
            SyncCommand::DeleteConversation { partner_id, reply } => {
                let _ = reply.send(self.delete_conversation(&partner_id));
            }
            SyncCommand::AllMessagesRemoved { partner_id, reply } => {
                debug!("All messages with {} removed", partner_id);
                let _ = reply.send(self.delete_conversation(&partner_id));
            }
            SyncCommand::AppBecameActive => {
                if self.load_finished {
                    self.notifications.app_became_active();
                }
            }
            SyncCommand::SetListVisible(visible) => self.notifications.set_list_visible(visible),
            SyncCommand::InboundNotificationReceived => self.notifications.inbound_received(),
            SyncCommand::AppearanceChanged => self.publish_list(true),
            SyncCommand::Snapshot(reply) => {
                let _ = reply.send(self.store.snapshot());
            }
            SyncCommand::LoadPhase(reply) => {
                let _ = reply.send(self.coordinator.phase());
            }
            SyncCommand::Badge(reply) => {
                let _ = reply.send(self.badge.current());
            }
            // Handled by the run loop
            SyncCommand::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn delete_conversation(&mut self, partner_id: &str) -> Result<(), SyncError> {
        if !self.reachability.is_reachable() {
            let err = SyncError::Unavailable;
            warn!("Refusing to delete conversation with {}: {}", partner_id, err);
            self.listener.on_delete_failed(partner_id, &err);
            return Err(err);
        }

        if self.messages.is_awaiting(partner_id) {
            self.notifications.discard_unhandled();
        }
        let removed = self.store.remove(partner_id).is_some();
        let cancelled = self.subscriptions.cancel_partner(partner_id);
        self.messages.forget(partner_id);
        self.metadata.forget(partner_id);
        self.profiles.forget(partner_id);
        self.coordinator.release(partner_id);
        info!(
            "Deleted conversation with {} (in list: {}, subscriptions cancelled: {})",
            partner_id, removed, cancelled
        );

        let path = self
            .config
            .schema
            .roster_entry(&self.config.current_user_id, partner_id);
        let delete = self.remote.delete(&path);
        let events = self.events_tx.clone();
        let partner_id = partner_id.to_string();
        tokio::spawn(async move {
            let result = delete.await;
            let _ = events.send(EngineEvent::DeleteFinished { partner_id, result });
        });

        self.after_mutation();
        Ok(())
    }

    // ===== Events =====

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Delivery { key, id, result } => self.handle_delivery(key, id, result),
            EngineEvent::RosterCounted(result) => self.handle_roster_counted(result),
            EngineEvent::ProfileFetched(fetch) => self.handle_profile_fetched(fetch),
            EngineEvent::DeleteFinished { partner_id, result } => {
                if let Err(e) = result {
                    error!("Remote delete of conversation with {} failed: {}", partner_id, e);
                    self.listener.on_delete_failed(&partner_id, &e);
                }
            }
            EngineEvent::InitialLoadFinished => self.handle_initial_load_finished(),
        }
    }

    fn handle_delivery(
        &mut self,
        key: SubscriptionKey,
        id: SubscriptionId,
        result: Result<Snapshot, SyncError>,
    ) {
        if !self.subscriptions.is_current(&key, id) {
            self.stats.record_stale();
            return;
        }

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // The forwarding task has ended; nothing is retried.
                self.subscriptions.cancel(&key);
                self.handle_transport_error(&key, e);
                return;
            }
        };

        match key {
            SubscriptionKey::RosterAdded => self.handle_roster_added(snapshot),
            SubscriptionKey::RosterRemoved => self.handle_roster_removed(snapshot),
            SubscriptionKey::Pointer(partner_id) => self.handle_pointer(&partner_id, snapshot),
            SubscriptionKey::Message(partner_id) => self.handle_message(&partner_id, snapshot),
            SubscriptionKey::Metadata(partner_id) => self.handle_metadata(&partner_id, snapshot),
            SubscriptionKey::ProfileFields(partner_id) => {
                self.handle_profile_field(&partner_id, snapshot)
            }
        }
    }

    fn handle_transport_error(&mut self, key: &SubscriptionKey, err: SyncError) {
        warn!("Subscription {:?} failed: {}", key, err);
        self.stats.record_transport_error();
        self.listener.on_transport_error(&err);
        if let Some(partner_id) = key.partner_id() {
            self.coordinator.release(partner_id);
        }
    }

    fn handle_roster_counted(&mut self, result: Result<Snapshot, SyncError>) {
        self.stats.record_handled(StreamKind::Roster);
        let partner_ids = match result {
            Ok(snapshot) => snapshot.child_keys(),
            Err(e) => {
                warn!("Counting roster failed: {}", e);
                self.stats.record_transport_error();
                self.listener.on_transport_error(&e);
                Vec::new()
            }
        };
        info!("Roster counted: {} conversations", partner_ids.len());
        self.coordinator.set_initial_roster(partner_ids);
    }

    fn handle_roster_added(&mut self, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Roster);
        if let Some((entry, known)) =
            self.roster
                .added(&snapshot, &self.config, &self.remote, &mut self.subscriptions)
        {
            if known {
                debug!("Roster entry re-added: {}", entry.partner_id);
            } else {
                debug!("Roster entry added: {}", entry.partner_id);
            }
        }
    }

    fn handle_roster_removed(&mut self, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Roster);
        self.set_loading(false);
        if let Some(entry) = self.roster.removed(&snapshot) {
            debug!("Roster entry removed: {}", entry.partner_id);
            self.coordinator.release(&entry.partner_id);
        }
    }

    fn handle_pointer(&mut self, partner_id: &str, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Pointer);
        let Some(message_id) = latest_pointer(&snapshot.value) else {
            debug!("No messages with {}", partner_id);
            self.coordinator.release(partner_id);
            return;
        };

        // A replaced message that never emitted hands its credit to the new one
        let credited = self.messages.is_awaiting(partner_id);
        if self.messages.point(
            partner_id,
            &message_id,
            &self.config,
            &self.remote,
            &mut self.subscriptions,
        ) {
            debug!("Last message with {} is now {}", partner_id, message_id);
            if !credited {
                self.notifications.inbound_received();
            }
            self.set_loading(true);
        }
    }

    fn handle_message(&mut self, partner_id: &str, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Message);
        let first_emission = self.messages.is_awaiting(partner_id);
        let message = match self.messages.resolve(partner_id, &snapshot, &self.config) {
            Ok(message) => message,
            Err(e) => {
                if first_emission {
                    self.notifications.discard_unhandled();
                }
                return self.skip(partner_id, e);
            }
        };

        let decision = self.notifications.decide(&message, self.load_finished);
        self.listener
            .on_notification_decision(decision, &message.from_id);

        let chat_partner = message.chat_partner_id(&self.config.current_user_id, partner_id);
        self.metadata.repoint(
            &chat_partner,
            message,
            &self.config,
            &self.remote,
            &mut self.subscriptions,
        );
    }

    fn handle_metadata(&mut self, partner_id: &str, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Metadata);
        let (message, metadata) = match self.metadata.resolve(partner_id, &snapshot, &self.config)
        {
            Ok(resolved) => resolved,
            Err(e) => return self.skip(partner_id, e),
        };

        self.profiles.request(
            partner_id,
            message,
            metadata,
            &self.config,
            &self.remote,
            &self.events_tx,
        );
        self.profiles
            .follow_fields(partner_id, &self.config, &self.remote, &mut self.subscriptions);
    }

    fn handle_profile_fetched(&mut self, fetch: ProfileFetch) {
        self.stats.record_handled(StreamKind::Profile);
        if !self.profiles.is_latest(&fetch) {
            self.stats.record_stale();
            return;
        }

        let partner_id = fetch.partner_id.clone();
        let conversation = match fetch.into_conversation() {
            Ok(conversation) => conversation,
            Err(e) => return self.skip(&partner_id, e),
        };

        self.stats.record_merge();
        if self.store.merge(conversation) == MergeOutcome::Inserted {
            debug!("Conversation with {} resolved", partner_id);
            self.coordinator.complete(&partner_id);
        }
        self.after_mutation();
        self.settle_loading();
    }

    fn handle_profile_field(&mut self, partner_id: &str, snapshot: Snapshot) {
        self.stats.record_handled(StreamKind::Profile);
        let Some((field, value)) = ProfileResolver::field_change(&snapshot, &self.config.schema)
        else {
            return;
        };

        match self.store.patch_profile(partner_id, field, value) {
            Ok(()) => self.after_mutation(),
            Err(e) => debug!("Profile change for {} ignored: {}", partner_id, e),
        }
    }

    /// A resolution chain ended without a merge.
    fn skip(&mut self, partner_id: &str, err: SyncError) {
        match &err {
            SyncError::MalformedRecord { .. } => {
                self.stats.record_malformed();
                warn!("Skipping record for {}: {}", partner_id, err);
            }
            _ => debug!("Nothing to show for {}: {}", partner_id, err),
        }
        self.coordinator.release(partner_id);
        self.settle_loading();
    }

    fn handle_initial_load_finished(&mut self) {
        if self.load_finished {
            return;
        }
        self.load_finished = true;
        info!(
            "Initial load finished with {} conversations",
            self.store.len()
        );
        self.listener.on_initial_load_finished();
        self.set_loading(false);
        self.publish_list(true);
    }

    // ===== Publishing =====

    fn after_mutation(&mut self) {
        self.publish_badge();
        self.publish_list(false);
    }

    fn publish_badge(&mut self) {
        if let Some(badge) = self.badge.update(self.store.conversations()) {
            self.listener.on_badge_changed(badge);
            self.badge_sink.set_badge(badge);
        }
    }

    /// List and empty-state signals are held back during the bulk load.
    fn publish_list(&mut self, force_empty_state: bool) {
        if !self.load_finished {
            return;
        }
        self.listener.on_list_changed(&self.store.snapshot());

        let is_empty = self.store.is_empty();
        if force_empty_state || self.last_empty != Some(is_empty) {
            self.last_empty = Some(is_empty);
            self.listener.on_empty_state_changed(is_empty);
        }
    }

    fn settle_loading(&mut self) {
        if self.load_finished {
            self.set_loading(false);
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.listener.on_loading_changed(loading);
        }
    }
}
