//! Interface to the realtime hierarchical store.
//!
//! Every observation the engine makes goes through [`RemoteStore`]. A subscription is a
//! stream; dropping the stream cancels it.

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::SyncError;

pub use memory::MemoryStore;

/// Future returned by one-shot store operations.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, SyncError>>;

/// Long-lived subscription. Yields until dropped; a transport failure ends it.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, SyncError>>;

/// Slash-separated key hierarchy, e.g. `roster/me/bob`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse `a/b/c`. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        Self::from_segments(path.split('/'))
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            key.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment, `None` at the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// True if one path contains the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl From<&str> for StorePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<&StorePath> for StorePath {
    fn from(path: &StorePath) -> Self {
        path.clone()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Value of one node at the time of a notification. `Value::Null` means the node is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: String,
    pub value: Value,
}

impl Snapshot {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    pub fn child_count(&self) -> usize {
        self.value.as_object().map_or(0, |map| map.len())
    }

    /// Child keys sorted by key, which is the store's child order.
    pub fn child_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .value
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// Operations the engine consumes from the realtime store.
pub trait RemoteStore: Send + Sync {
    /// Read a node once.
    fn get_once(&self, path: &StorePath) -> StoreFuture<'static, Snapshot>;

    /// Current value of a node, then every change to it.
    fn subscribe_value(&self, path: &StorePath) -> SnapshotStream;

    /// Value subscription restricted to the last `limit` children in key order.
    fn subscribe_last_children(&self, path: &StorePath, limit: usize) -> SnapshotStream;

    /// Every existing child, then each child added later.
    fn subscribe_child_added(&self, path: &StorePath) -> SnapshotStream;

    /// Each child removed after the subscription starts, with its last value.
    fn subscribe_child_removed(&self, path: &StorePath) -> SnapshotStream;

    /// Each direct child whose value changes after the subscription starts.
    fn subscribe_child_changed(&self, path: &StorePath) -> SnapshotStream;

    /// Remove a node and everything below it.
    fn delete(&self, path: &StorePath) -> StoreFuture<'static, ()>;
}

/// Network availability as seen by the device.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Reachability flag shared between the platform monitor and the engine.
#[derive(Debug, Clone)]
pub struct SharedReachability {
    reachable: Arc<AtomicBool>,
}

impl Default for SharedReachability {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SharedReachability {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(reachable)),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl Reachability for SharedReachability {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_parse_and_display() {
        let path = StorePath::parse("/roster//me/bob/");
        assert_eq!(path.segments(), ["roster", "me", "bob"]);
        assert_eq!(path.to_string(), "roster/me/bob");
        assert_eq!(path.key(), Some("bob"));
        assert_eq!(path.parent().unwrap().to_string(), "roster/me");
        assert!(StorePath::root().parent().is_none());
    }

    #[test]
    fn test_path_containment() {
        let roster = StorePath::parse("roster/me");
        let entry = roster.child("bob");
        assert!(roster.contains(&entry));
        assert!(!entry.contains(&roster));
        assert!(entry.overlaps(&roster));
        assert!(!entry.overlaps(&StorePath::parse("roster/other")));
        assert!(StorePath::root().contains(&entry));
    }

    #[test]
    fn test_snapshot_children() {
        let snapshot = Snapshot::new("me", json!({"b": 1, "a": 2}));
        assert!(snapshot.exists());
        assert_eq!(snapshot.child_count(), 2);
        assert_eq!(snapshot.child_keys(), vec!["a", "b"]);
        assert_eq!(Snapshot::new("x", Value::Null).child_count(), 0);
    }

    #[test]
    fn test_shared_reachability() {
        let reachability = SharedReachability::default();
        assert!(reachability.is_reachable());
        let clone = reachability.clone();
        clone.set_reachable(false);
        assert!(!reachability.is_reachable());
    }
}
