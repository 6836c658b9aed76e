//! In-process JSON tree store

use super::{segments, Child, ChildStream, DataStore, PushKeyGenerator, Replay, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Store state guarded by a single lock
#[derive(Default)]
struct StoreState {
    root: Map<String, Value>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Child>>>,
    keys: PushKeyGenerator,
}

impl StoreState {
    fn lookup(&self, parts: &[&str]) -> Option<&Value> {
        let (first, rest) = parts.split_first()?;
        let mut node = self.root.get(*first)?;
        for part in rest {
            node = node.as_object()?.get(*part)?;
        }
        Some(node)
    }

    /// Write a value, creating parents; returns the depth of the first new node
    fn write(&mut self, parts: &[&str], value: Value) -> Result<Option<usize>, StoreError> {
        let last = parts.len() - 1;
        let mut created = None;
        let mut node = &mut self.root;

        for (depth, part) in parts[..last].iter().enumerate() {
            if !node.contains_key(*part) {
                created.get_or_insert(depth);
            }
            let entry = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            node = entry
                .as_object_mut()
                .ok_or_else(|| StoreError::NotAnObject(parts[..=depth].join("/")))?;
        }

        if !node.contains_key(parts[last]) {
            created.get_or_insert(last);
        }
        node.insert(parts[last].to_string(), value);
        Ok(created)
    }

    fn remove(&mut self, parts: &[&str]) {
        let Some((leaf, parents)) = parts.split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for part in parents {
            match node.get_mut(*part).and_then(Value::as_object_mut) {
                Some(next) => node = next,
                None => return,
            }
        }
        node.remove(*leaf);
    }

    fn set(&mut self, parts: &[&str], value: Value) -> Result<(), StoreError> {
        if value.is_null() {
            self.remove(parts);
            return Ok(());
        }

        // Every node created by this write is a new child of its parent
        if let Some(first) = self.write(parts, value)? {
            for depth in first..parts.len() {
                let parent = parts[..depth].join("/");
                if let Some(value) = self.lookup(&parts[..=depth]).cloned() {
                    self.notify(&parent, Child::new(parts[depth], value));
                }
            }
        }
        Ok(())
    }

    fn notify(&mut self, parent: &str, child: Child) {
        if let Some(senders) = self.watchers.get_mut(parent) {
            senders.retain(|tx| tx.send(child.clone()).is_ok());
        }
    }

    /// Drop watchers whose stream was closed or dropped
    fn prune_closed(&mut self) {
        self.watchers.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }

    fn sorted_children(&self, parts: &[&str]) -> Vec<Child> {
        let mut children: Vec<Child> = match self.lookup(parts).and_then(Value::as_object) {
            Some(map) => map
                .iter()
                .map(|(key, value)| Child::new(key.clone(), value.clone()))
                .collect(),
            None => vec![],
        };
        children.sort_by(|a, b| a.key.cmp(&b.key));
        children
    }
}

/// JSON tree store held in memory
///
/// Writes are applied and acknowledged under one lock, and append
/// notifications are queued to watchers before the write returns.
/// The whole tree can be persisted to and restored from a JSON snapshot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given tree
    pub fn from_value(root: Value) -> Result<Self, StoreError> {
        let root = match root {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(StoreError::NotAnObject("/".to_string())),
        };
        let state = StoreState {
            root,
            ..Default::default()
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Restore a snapshot, or start empty when the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            tracing::info!(path = ?path, "No store snapshot, starting empty");
            return Ok(Self::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let root: Value = serde_json::from_str(&content)?;
        tracing::info!(path = ?path, "Restored store snapshot");
        Self::from_value(root)
    }

    /// Write the whole tree as a JSON snapshot
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let content = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&state.root)?
        };
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path.as_ref(), content).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let parts = segments(path)?;
        let state = self.state.lock().await;
        Ok(state.lookup(&parts).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let parts = segments(path)?;
        let mut state = self.state.lock().await;
        state.set(&parts, value)
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let parts = segments(path)?;
        let mut state = self.state.lock().await;
        for (field, value) in fields {
            let mut full = parts.clone();
            full.push(field.as_str());
            state.set(&full, value)?;
        }
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let parts = segments(path)?;
        let mut state = self.state.lock().await;
        let key = state.keys.next_key();
        {
            let mut full = parts;
            full.push(key.as_str());
            state.set(&full, value)?;
        }
        Ok(key)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let parts = segments(path)?;
        let mut state = self.state.lock().await;
        state.remove(&parts);
        Ok(())
    }

    async fn children_in_range(
        &self,
        path: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<Child>, StoreError> {
        let parts = segments(path)?;
        let state = self.state.lock().await;
        let children = state
            .sorted_children(&parts)
            .into_iter()
            .filter(|c| start.map_or(true, |s| c.key.as_str() >= s))
            .filter(|c| end.map_or(true, |e| c.key.as_str() <= e))
            .collect();
        Ok(children)
    }

    async fn watch_children(&self, path: &str, replay: Replay) -> Result<ChildStream, StoreError> {
        let parts = segments(path)?;
        let canonical = parts.join("/");
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().await;
        state.prune_closed();
        let existing = state.sorted_children(&parts);
        let replayed = match replay {
            Replay::None => &existing[..0],
            Replay::All => &existing[..],
            Replay::Last(n) => &existing[existing.len().saturating_sub(n)..],
        };
        for child in replayed {
            // Receiver is still held locally, so this cannot fail
            let _ = tx.send(child.clone());
        }
        state.watchers.entry(canonical.clone()).or_default().push(tx);

        Ok(ChildStream::new(canonical, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_and_get_nested() {
        let store = MemoryStore::new();
        store.set("a/b/c", json!(1)).await.unwrap();
        assert_eq!(store.get("a/b/c").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("a/b").await.unwrap(), Some(json!({"c": 1})));
        assert_eq!(store.get("a/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_null_removes() {
        let store = MemoryStore::new();
        store.set("a/b", json!("x")).await.unwrap();
        store.set("a/b", Value::Null).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_below_leaf_fails() {
        let store = MemoryStore::new();
        store.set("a", json!(5)).await.unwrap();
        let err = store.set("a/b", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject(_)));
    }

    #[tokio::test]
    async fn test_push_keys_preserve_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.push("log", json!(i)).await.unwrap();
        }
        let children = store.children_in_range("log", None, None).await.unwrap();
        let values: Vec<Value> = children.into_iter().map(|c| c.value).collect();
        assert_eq!(values, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn test_children_in_range_is_inclusive() {
        let store = MemoryStore::new();
        for key in ["2015-01-01", "2015-01-02", "2015-01-05", "2015-02-01"] {
            store.set(&format!("days/{}", key), json!(key)).await.unwrap();
        }

        let children = store
            .children_in_range("days", Some("2015-01-02"), Some("2015-01-05~"))
            .await
            .unwrap();
        let keys: Vec<&str> = children.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["2015-01-02", "2015-01-05"]);
    }

    #[tokio::test]
    async fn test_watch_replays_last_and_streams_new() {
        let store = MemoryStore::new();
        store.set("sims/a", json!({"n": 1})).await.unwrap();
        store.set("sims/b", json!({"n": 2})).await.unwrap();

        let mut stream = store.watch_children("sims", Replay::Last(1)).await.unwrap();
        assert_eq!(stream.try_recv().unwrap().key, "b");
        assert!(stream.try_recv().is_none());

        store.set("sims/c", json!({"n": 3})).await.unwrap();
        let child = stream.recv().await.unwrap();
        assert_eq!(child, Child::new("c", json!({"n": 3})));
    }

    #[tokio::test]
    async fn test_watch_ignores_updates_to_existing_children() {
        let store = MemoryStore::new();
        store.set("sims/a", json!({"op": "Starting"})).await.unwrap();
        let mut stream = store.watch_children("sims", Replay::None).await.unwrap();

        store.set("sims/a/op", json!("Running")).await.unwrap();
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_implicit_parent_creation_notifies_subtree() {
        let store = MemoryStore::new();
        let mut stream = store
            .watch_children("history/daily", Replay::None)
            .await
            .unwrap();

        store
            .set("history/daily/2015-01-02/SPY", json!({"close": 1}))
            .await
            .unwrap();
        let child = stream.try_recv().unwrap();
        assert_eq!(child.key, "2015-01-02");
        assert_eq!(child.value, json!({"SPY": {"close": 1}}));
    }

    #[tokio::test]
    async fn test_closed_stream_is_pruned() {
        let store = MemoryStore::new();
        let stream = store.watch_children("log", Replay::None).await.unwrap();
        stream.close();
        store.push("log", json!(1)).await.unwrap();

        let state = store.state.lock().await;
        assert!(state.watchers.get("log").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_streams_on_quiet_paths_are_dropped() {
        let store = MemoryStore::new();
        let bar = store.watch_children("sims/a/events/bar", Replay::None).await.unwrap();
        let inbox = store.watch_children("sims/a/events/inbox", Replay::None).await.unwrap();
        bar.close();
        drop(inbox);

        let _next = store.watch_children("sims", Replay::None).await.unwrap();
        let state = store.state.lock().await;
        assert!(!state.watchers.contains_key("sims/a/events/bar"));
        assert!(!state.watchers.contains_key("sims/a/events/inbox"));
        assert_eq!(state.watchers.len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .set("sims/a", json!({"op": "Starting", "strategy": "Ivy"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("op".to_string(), json!("Running"));
        store.update("sims/a", fields).await.unwrap();

        assert_eq!(
            store.get("sims/a").await.unwrap(),
            Some(json!({"op": "Running", "strategy": "Ivy"}))
        );
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store.json");

        let store = MemoryStore::new();
        store.set("history/daily/2015-01-02/SPY/close", json!("205.43")).await.unwrap();
        store.save(&path).await.unwrap();

        let restored = MemoryStore::open(&path).await.unwrap();
        assert_eq!(
            restored.get("history/daily/2015-01-02/SPY/close").await.unwrap(),
            Some(json!("205.43"))
        );
    }

    #[tokio::test]
    async fn test_open_missing_snapshot_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = MemoryStore::open(temp_dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }
}
