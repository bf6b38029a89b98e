use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Remote streams the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Roster,
    Pointer,
    Message,
    Metadata,
    Profile,
}

/// Counters for events handled by the sync engine
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Events handled per stream kind
    pub handled: HashMap<StreamKind, u64>,
    pub malformed_skipped: u64,
    /// Events from cancelled or replaced subscriptions
    pub stale_dropped: u64,
    pub transport_errors: u64,
    pub open_subscriptions: usize,
    pub merges: u64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled_for(&self, kind: StreamKind) -> u64 {
        self.handled.get(&kind).copied().unwrap_or(0)
    }

    /// Total events handled across all streams
    pub fn total_handled(&self) -> u64 {
        self.handled.values().sum()
    }
}

/// Thread-safe wrapper for sync stats
#[derive(Debug, Clone, Default)]
pub struct SharedSyncStats {
    inner: Arc<RwLock<SyncStats>>,
}

impl SharedSyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_handled(&self, kind: StreamKind) {
        *self.inner.write().handled.entry(kind).or_insert(0) += 1;
    }

    pub fn record_malformed(&self) {
        self.inner.write().malformed_skipped += 1;
    }

    pub fn record_stale(&self) {
        self.inner.write().stale_dropped += 1;
    }

    pub fn record_transport_error(&self) {
        self.inner.write().transport_errors += 1;
    }

    pub fn record_merge(&self) {
        self.inner.write().merges += 1;
    }

    pub fn set_open_subscriptions(&self, count: usize) {
        self.inner.write().open_subscriptions = count;
    }

    pub fn snapshot(&self) -> SyncStats {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_stats_record() {
        let stats = SharedSyncStats::new();
        stats.record_handled(StreamKind::Message);
        stats.record_handled(StreamKind::Message);
        stats.record_handled(StreamKind::Roster);
        stats.record_malformed();
        stats.record_stale();
        stats.set_open_subscriptions(4);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.handled_for(StreamKind::Message), 2);
        assert_eq!(snapshot.handled_for(StreamKind::Profile), 0);
        assert_eq!(snapshot.total_handled(), 3);
        assert_eq!(snapshot.malformed_skipped, 1);
        assert_eq!(snapshot.stale_dropped, 1);
        assert_eq!(snapshot.open_subscriptions, 4);
    }

    #[test]
    fn test_clones_share_counters() {
        let stats = SharedSyncStats::new();
        let clone = stats.clone();
        clone.record_transport_error();
        assert_eq!(stats.snapshot().transport_errors, 1);
    }
}
