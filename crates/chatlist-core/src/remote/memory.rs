use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{RemoteStore, Snapshot, SnapshotStream, StoreFuture, StorePath};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchKind {
    Value,
    LastChildren(usize),
    ChildAdded,
    ChildRemoved,
    ChildChanged,
}

struct Watcher {
    path: StorePath,
    kind: WatchKind,
    tx: UnboundedSender<Result<Snapshot, SyncError>>,
}

impl Watcher {
    fn send(&self, key: &str, value: Value) {
        let _ = self.tx.unbounded_send(Ok(Snapshot::new(key, value)));
    }

    fn key(&self) -> &str {
        self.path.key().unwrap_or_default()
    }

    /// Emit whatever this watcher observes between two values of its node.
    fn emit_changes(&self, before: &Value, after: &Value) {
        match self.kind {
            WatchKind::Value => {
                if before != after {
                    self.send(self.key(), after.clone());
                }
            }
            WatchKind::LastChildren(limit) => {
                let before = last_children(before, limit);
                let after = last_children(after, limit);
                if before != after {
                    self.send(self.key(), after);
                }
            }
            WatchKind::ChildAdded => {
                for (key, value) in sorted_children(after) {
                    if child(before, &key).is_none() {
                        self.send(&key, value);
                    }
                }
            }
            WatchKind::ChildRemoved => {
                for (key, value) in sorted_children(before) {
                    if child(after, &key).is_none() {
                        self.send(&key, value);
                    }
                }
            }
            WatchKind::ChildChanged => {
                for (key, value) in sorted_children(after) {
                    if child(before, &key).is_some_and(|old| *old != value) {
                        self.send(&key, value);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct MemoryTree {
    root: Value,
    watchers: Vec<Watcher>,
}

/// In-process realtime store with the delivery model of the hosted backend.
///
/// Clones share the same tree and subscriptions. Empty objects are never stored: writing
/// `null` or `{}` removes the node and any parent left empty.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryTree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a whole tree.
    pub fn with_tree(tree: Value) -> Self {
        let store = Self::new();
        store.inner.lock().root = normalize(tree);
        store
    }

    // ===== Reads =====

    pub fn value(&self, path: impl Into<StorePath>) -> Value {
        read(&self.inner.lock().root, &path.into())
    }

    pub fn exists(&self, path: impl Into<StorePath>) -> bool {
        !self.value(path).is_null()
    }

    /// Live subscriptions registered exactly at `path`.
    pub fn subscriber_count(&self, path: impl Into<StorePath>) -> usize {
        let path = path.into();
        self.inner
            .lock()
            .watchers
            .iter()
            .filter(|w| w.path == path && !w.tx.is_closed())
            .count()
    }

    // ===== Writes =====

    pub fn set(&self, path: impl Into<StorePath>, value: Value) {
        let path = path.into();
        let value = normalize(value);
        self.mutate(&path, |root| write(root, path.segments(), value));
    }

    /// Set several children of `path` in one notification round.
    pub fn update(&self, path: impl Into<StorePath>, children: Map<String, Value>) {
        let path = path.into();
        self.mutate(&path, |root| {
            for (key, value) in children {
                let child = path.child(&key);
                write(root, child.segments(), normalize(value));
            }
        });
    }

    pub fn remove(&self, path: impl Into<StorePath>) {
        self.set(path, Value::Null);
    }

    /// End every subscription at or below `path` with a transport error.
    pub fn fail_path(&self, path: impl Into<StorePath>, message: &str) {
        let path = path.into();
        self.inner.lock().watchers.retain(|watcher| {
            if path.contains(&watcher.path) {
                let _ = watcher
                    .tx
                    .unbounded_send(Err(SyncError::transport(&watcher.path, message)));
                false
            } else {
                !watcher.tx.is_closed()
            }
        });
    }

    fn mutate(&self, path: &StorePath, apply: impl FnOnce(&mut Value)) {
        let mut guard = self.inner.lock();
        let MemoryTree { root, watchers } = &mut *guard;
        watchers.retain(|w| !w.tx.is_closed());

        let before: Vec<Option<Value>> = watchers
            .iter()
            .map(|w| w.path.overlaps(path).then(|| read(root, &w.path)))
            .collect();

        apply(root);

        for (watcher, before) in watchers.iter().zip(before) {
            if let Some(before) = before {
                let after = read(root, &watcher.path);
                watcher.emit_changes(&before, &after);
            }
        }
    }

    fn subscribe(&self, path: &StorePath, kind: WatchKind) -> SnapshotStream {
        let (tx, rx) = mpsc::unbounded();
        let watcher = Watcher {
            path: path.clone(),
            kind,
            tx,
        };

        let mut tree = self.inner.lock();
        let current = read(&tree.root, path);
        match kind {
            WatchKind::Value => watcher.send(watcher.key(), current),
            WatchKind::LastChildren(limit) => {
                watcher.send(watcher.key(), last_children(&current, limit));
            }
            WatchKind::ChildAdded => {
                for (key, value) in sorted_children(&current) {
                    watcher.send(&key, value);
                }
            }
            WatchKind::ChildRemoved | WatchKind::ChildChanged => {}
        }
        tree.watchers.push(watcher);

        rx.boxed()
    }
}

impl RemoteStore for MemoryStore {
    fn get_once(&self, path: &StorePath) -> StoreFuture<'static, Snapshot> {
        let snapshot = Snapshot::new(path.key().unwrap_or_default(), self.value(path));
        async move { Ok::<_, SyncError>(snapshot) }.boxed()
    }

    fn subscribe_value(&self, path: &StorePath) -> SnapshotStream {
        self.subscribe(path, WatchKind::Value)
    }

    fn subscribe_last_children(&self, path: &StorePath, limit: usize) -> SnapshotStream {
        self.subscribe(path, WatchKind::LastChildren(limit))
    }

    fn subscribe_child_added(&self, path: &StorePath) -> SnapshotStream {
        self.subscribe(path, WatchKind::ChildAdded)
    }

    fn subscribe_child_removed(&self, path: &StorePath) -> SnapshotStream {
        self.subscribe(path, WatchKind::ChildRemoved)
    }

    fn subscribe_child_changed(&self, path: &StorePath) -> SnapshotStream {
        self.subscribe(path, WatchKind::ChildChanged)
    }

    fn delete(&self, path: &StorePath) -> StoreFuture<'static, ()> {
        self.remove(path);
        async { Ok::<_, SyncError>(()) }.boxed()
    }
}

fn read(root: &Value, path: &StorePath) -> Value {
    let mut node = root;
    for segment in path.segments() {
        match child(node, segment) {
            Some(next) => node = next,
            None => return Value::Null,
        }
    }
    node.clone()
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_object().and_then(|map| map.get(key))
}

fn sorted_children(value: &Value) -> Vec<(String, Value)> {
    let mut children: Vec<(String, Value)> = value
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    children.sort_by(|a, b| a.0.cmp(&b.0));
    children
}

fn last_children(value: &Value, limit: usize) -> Value {
    let children = sorted_children(value);
    if children.is_empty() || limit == 0 {
        return Value::Null;
    }
    let skip = children.len().saturating_sub(limit);
    Value::Object(children.into_iter().skip(skip).collect())
}

fn is_empty_node(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

/// Drop nulls and empty objects, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty_node(v))
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn write(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }

    let child = map.entry(head.clone()).or_insert(Value::Null);
    write(child, rest, value);
    if is_empty_node(child) {
        map.remove(head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    fn next_now(stream: &mut SnapshotStream) -> Option<Result<Snapshot, SyncError>> {
        stream.next().now_or_never().flatten()
    }

    #[test]
    fn test_set_and_remove_prunes_empty_parents() {
        let store = MemoryStore::new();
        store.set("roster/me/bob/lastMessagePointer/m1", json!(true));
        assert_eq!(store.value("roster/me/bob/lastMessagePointer/m1"), json!(true));

        store.remove("roster/me/bob/lastMessagePointer/m1");
        assert!(!store.exists("roster/me/bob"));
        assert!(!store.exists("roster"));
    }

    #[test]
    fn test_value_subscription_emits_current_then_changes() {
        let store = MemoryStore::with_tree(json!({"messages": {"m1": {"text": "hi"}}}));
        let mut stream = store.subscribe_value(&StorePath::parse("messages/m1"));

        let first = next_now(&mut stream).unwrap().unwrap();
        assert_eq!(first.key, "m1");
        assert_eq!(first.value, json!({"text": "hi"}));
        assert!(next_now(&mut stream).is_none());

        store.set("messages/m1/seen", json!(true));
        let second = next_now(&mut stream).unwrap().unwrap();
        assert_eq!(second.value, json!({"text": "hi", "seen": true}));

        // Unrelated writes are not delivered
        store.set("messages/m2/text", json!("other"));
        assert!(next_now(&mut stream).is_none());
    }

    #[test]
    fn test_value_subscription_on_missing_node_emits_null() {
        let store = MemoryStore::new();
        let mut stream = store.subscribe_value(&StorePath::parse("users/ghost"));
        let first = next_now(&mut stream).unwrap().unwrap();
        assert!(!first.exists());
    }

    #[test]
    fn test_child_added_replays_existing_children() {
        let store = MemoryStore::with_tree(json!({"roster": {"me": {"b": 1, "a": 2}}}));
        let mut stream = store.subscribe_child_added(&StorePath::parse("roster/me"));

        assert_eq!(next_now(&mut stream).unwrap().unwrap().key, "a");
        assert_eq!(next_now(&mut stream).unwrap().unwrap().key, "b");
        assert!(next_now(&mut stream).is_none());

        store.set("roster/me/c", json!(3));
        assert_eq!(next_now(&mut stream).unwrap().unwrap().key, "c");

        // Changing an existing child is not an addition
        store.set("roster/me/a", json!(5));
        assert!(next_now(&mut stream).is_none());
    }

    #[test]
    fn test_child_removed_and_changed() {
        let store = MemoryStore::with_tree(json!({"users": {"bob": {"name": "Bob"}}}));
        let mut removed = store.subscribe_child_removed(&StorePath::parse("users/bob"));
        let mut changed = store.subscribe_child_changed(&StorePath::parse("users/bob"));
        assert!(next_now(&mut removed).is_none());
        assert!(next_now(&mut changed).is_none());

        store.set("users/bob/name", json!("Robert"));
        let change = next_now(&mut changed).unwrap().unwrap();
        assert_eq!(change.key, "name");
        assert_eq!(change.value, json!("Robert"));

        store.set("users/bob/thumbnailUrl", json!("http://img"));
        // A new field is an addition, not a change
        assert!(next_now(&mut changed).is_none());

        store.remove("users/bob/name");
        let gone = next_now(&mut removed).unwrap().unwrap();
        assert_eq!(gone.key, "name");
        assert_eq!(gone.value, json!("Robert"));
    }

    #[test]
    fn test_last_children_follows_most_recent_key() {
        let store = MemoryStore::with_tree(json!({"p": {"m1": true}}));
        let mut stream = store.subscribe_last_children(&StorePath::parse("p"), 1);
        assert_eq!(next_now(&mut stream).unwrap().unwrap().value, json!({"m1": true}));

        store.set("p/m2", json!(true));
        assert_eq!(next_now(&mut stream).unwrap().unwrap().value, json!({"m2": true}));

        // An older key does not change the window
        store.set("p/m0", json!(true));
        assert!(next_now(&mut stream).is_none());
    }

    #[test]
    fn test_dropped_stream_is_pruned() {
        let store = MemoryStore::new();
        let stream = store.subscribe_value(&StorePath::parse("a"));
        assert_eq!(store.subscriber_count("a"), 1);
        drop(stream);
        assert_eq!(store.subscriber_count("a"), 0);
        store.set("a", json!(1));
        assert_eq!(store.inner.lock().watchers.len(), 0);
    }

    #[test]
    fn test_fail_path_ends_subscriptions_below() {
        let store = MemoryStore::new();
        let mut inside = store.subscribe_child_added(&StorePath::parse("roster/me"));
        let mut outside = store.subscribe_value(&StorePath::parse("users/bob"));
        let _ = next_now(&mut outside);

        store.fail_path("roster", "permission denied");
        match next_now(&mut inside) {
            Some(Err(SyncError::Transport { path, message })) => {
                assert_eq!(path, "roster/me");
                assert_eq!(message, "permission denied");
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        // Stream is closed afterwards
        assert!(matches!(inside.next().now_or_never(), Some(None)));
        assert_eq!(store.subscriber_count("users/bob"), 1);
    }

    #[test]
    fn test_get_once_and_delete() {
        let store = MemoryStore::with_tree(json!({"roster": {"me": {"bob": {"x": 1}}}}));
        let snapshot = store
            .get_once(&StorePath::parse("roster/me"))
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.child_count(), 1);

        store
            .delete(&StorePath::parse("roster/me/bob"))
            .now_or_never()
            .unwrap()
            .unwrap();
        assert!(!store.exists("roster/me/bob"));
    }
}
