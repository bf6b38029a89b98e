use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatlist_core::{
    Conversation, ConversationListener, MemoryStore, NoopBadgeSink, SharedReachability,
    SyncConfig, SyncRuntime,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::info;

/// Inputs for one fixture run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Whole remote tree to seed the in-memory store with
    pub fixture: Value,
    pub search: Option<String>,
    pub delete: Option<String>,
    /// Simulate no network for the delete
    pub offline: bool,
    pub initial_load_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRow {
    pub partner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub preview: String,
    pub timestamp: i64,
    pub unread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
}

impl ConversationRow {
    pub fn from_conversation(conversation: &Conversation, current_user_id: &str) -> Self {
        Self {
            partner_id: conversation.partner_id().to_string(),
            name: conversation.user.name.clone(),
            thumbnail_url: conversation.user.thumbnail_url.clone(),
            preview: conversation.message.preview(),
            timestamp: conversation.message.timestamp,
            unread: conversation.is_unread_for(current_user_id),
            badge: conversation.row_badge(current_user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub partner_id: String,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub conversations: Vec<ConversationRow>,
    pub filtered: Vec<ConversationRow>,
    pub badge: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DeleteOutcome>,
}

/// Signals when the engine finishes its initial load.
#[derive(Default)]
struct InitialLoadWaiter {
    finished: AtomicBool,
    notify: Notify,
}

impl InitialLoadWaiter {
    async fn wait(&self) {
        while !self.finished.load(Ordering::SeqCst) {
            let notified = self.notify.notified();
            if self.finished.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }
    }
}

impl ConversationListener for InitialLoadWaiter {
    fn on_initial_load_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Seed a store from the fixture, run the engine until loaded and report the list.
pub async fn run(config: SyncConfig, options: RunOptions) -> Result<Report> {
    let current_user_id = config.current_user_id.clone();
    let store = MemoryStore::with_tree(options.fixture);
    let reachability = SharedReachability::new(!options.offline);
    let waiter = Arc::new(InitialLoadWaiter::default());

    let runtime = SyncRuntime::start(
        config,
        Arc::new(store),
        Arc::new(reachability),
        waiter.clone(),
        Arc::new(NoopBadgeSink),
    );
    let handle = runtime.handle();

    tokio::time::timeout(options.initial_load_timeout, waiter.wait())
        .await
        .with_context(|| {
            format!(
                "Initial load did not finish within {:?}",
                options.initial_load_timeout
            )
        })?;

    if let Some(search) = &options.search {
        handle.set_filter(search.as_str())?;
    }

    let deleted = match &options.delete {
        Some(partner_id) => {
            let result = handle.delete_conversation(partner_id.as_str()).await;
            info!("Delete of {} finished: {:?}", partner_id, result);
            Some(DeleteOutcome {
                partner_id: partner_id.clone(),
                deleted: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            })
        }
        None => None,
    };

    let snapshot = handle.snapshot().await?;
    let badge = handle.badge().await?;
    runtime.shutdown().await;

    let rows = |conversations: &[Conversation]| {
        conversations
            .iter()
            .map(|c| ConversationRow::from_conversation(c, &current_user_id))
            .collect::<Vec<_>>()
    };

    Ok(Report {
        conversations: rows(snapshot.visible.as_slice()),
        filtered: rows(snapshot.filtered.as_slice()),
        badge,
        deleted,
    })
}
