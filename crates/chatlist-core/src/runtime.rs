use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{BadgeSink, ConversationListener, ListSnapshot};
use crate::remote::{Reachability, RemoteStore};
use crate::stats::SharedSyncStats;
use crate::sync::engine::SyncEngine;
use crate::sync::LoadPhase;

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Requests from the UI side, handled in order on the engine task.
#[derive(Debug)]
pub(crate) enum SyncCommand {
    SetFilter(String),
    DeleteConversation {
        partner_id: String,
        reply: Reply<Result<(), SyncError>>,
    },
    /// The message-detail screen removed every message with this partner
    AllMessagesRemoved {
        partner_id: String,
        reply: Reply<Result<(), SyncError>>,
    },
    AppBecameActive,
    SetListVisible(bool),
    InboundNotificationReceived,
    AppearanceChanged,
    Snapshot(Reply<ListSnapshot>),
    LoadPhase(Reply<LoadPhase>),
    Badge(Reply<Option<usize>>),
    Shutdown(Reply<()>),
}

#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub(crate) fn new(command_tx: mpsc::UnboundedSender<SyncCommand>) -> Self {
        Self { command_tx }
    }

    fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.command_tx
            .send(command)
            .map_err(|_| SyncError::EngineClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> SyncCommand) -> Result<T, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx))?;
        reply_rx.await.map_err(|_| SyncError::EngineClosed)
    }

    pub fn set_filter(&self, text: impl Into<String>) -> Result<(), SyncError> {
        self.send(SyncCommand::SetFilter(text.into()))
    }

    /// Delete a conversation. Fails with `Unavailable` while offline, leaving the list unchanged.
    pub async fn delete_conversation(&self, partner_id: impl Into<String>) -> Result<(), SyncError> {
        let partner_id = partner_id.into();
        self.request(|reply| SyncCommand::DeleteConversation { partner_id, reply })
            .await?
    }

    pub async fn all_messages_removed(&self, partner_id: impl Into<String>) -> Result<(), SyncError> {
        let partner_id = partner_id.into();
        self.request(|reply| SyncCommand::AllMessagesRemoved { partner_id, reply })
            .await?
    }

    pub fn app_became_active(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::AppBecameActive)
    }

    pub fn set_list_visible(&self, visible: bool) -> Result<(), SyncError> {
        self.send(SyncCommand::SetListVisible(visible))
    }

    /// A push for an inbound message arrived outside the engine.
    pub fn inbound_notification_received(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::InboundNotificationReceived)
    }

    /// Theme changed: re-publish the current list.
    pub fn appearance_changed(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::AppearanceChanged)
    }

    pub async fn snapshot(&self) -> Result<ListSnapshot, SyncError> {
        self.request(SyncCommand::Snapshot).await
    }

    pub async fn load_phase(&self) -> Result<LoadPhase, SyncError> {
        self.request(SyncCommand::LoadPhase).await
    }

    pub async fn badge(&self) -> Result<Option<usize>, SyncError> {
        self.request(SyncCommand::Badge).await
    }

    /// Dispose every subscription and stop the engine.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.request(SyncCommand::Shutdown).await
    }
}

/// Owns the engine task for one conversation-list screen.
pub struct SyncRuntime {
    handle: SyncHandle,
    engine_task: Option<JoinHandle<()>>,
    stats: SharedSyncStats,
}

impl SyncRuntime {
    /// Start the engine on the current tokio runtime.
    pub fn start(
        config: SyncConfig,
        remote: Arc<dyn RemoteStore>,
        reachability: Arc<dyn Reachability>,
        listener: Arc<dyn ConversationListener>,
        badge_sink: Arc<dyn BadgeSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stats = SharedSyncStats::new();

        info!("Starting conversation sync for {}", config.current_user_id);
        let engine = SyncEngine::new(
            config,
            remote,
            reachability,
            listener,
            badge_sink,
            stats.clone(),
        );
        let engine_task = tokio::spawn(engine.run(command_rx));

        Self {
            handle: SyncHandle::new(command_tx),
            engine_task: Some(engine_task),
            stats,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> SharedSyncStats {
        self.stats.clone()
    }

    pub async fn shutdown(mut self) {
        let _ = self.handle.shutdown().await;
        if let Some(task) = self.engine_task.take() {
            let _ = task.await;
        }
    }
}
