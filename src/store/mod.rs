//! Realtime data store
//!
//! The simulation core talks to its persistence layer through [`DataStore`]:
//! ordered range reads by key, child-append notifications, acknowledged
//! writes and a monotonic key generator for appended children.

mod keys;
mod memory;
mod types;

pub use keys::PushKeyGenerator;
pub use memory::MemoryStore;
pub use types::{child_path, segments, Child, ChildStream, Replay, StoreError};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Trait for data store implementations
///
/// Every write resolves only once the store has acknowledged it.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read the value at a path
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value at a path (`Value::Null` removes it)
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge fields into the object at a path
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Append a child under a monotonically ordered key and return the key
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Remove a subtree
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Children of a path with keys in `[start, end]`, ordered by key
    async fn children_in_range(
        &self,
        path: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<Child>, StoreError>;

    /// Subscribe to children appended under a path
    async fn watch_children(&self, path: &str, replay: Replay) -> Result<ChildStream, StoreError>;
}
