//! Data store types

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Data store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path is empty or malformed
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),
    /// A non-object node sits where a parent is required
    #[error("Cannot write below leaf at {0}")]
    NotAnObject(String),
    /// Write was rejected by the backend
    #[error("Write rejected at {path}: {reason}")]
    WriteRejected { path: String, reason: String },
    /// Delivery did not complete in time
    #[error("Timed out writing {0}")]
    Timeout(String),
    /// Change notification stream ended
    #[error("Notification stream for {0} closed")]
    StreamClosed(String),
    /// Snapshot file I/O
    #[error("Snapshot I/O: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot or value encoding
    #[error("Serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A child node, as returned by range reads and append notifications
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    /// Key of the child under its parent
    pub key: String,
    /// Full value of the child subtree
    pub value: Value,
}

impl Child {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Which existing children a new watch delivers before live appends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Only children appended after the watch starts
    None,
    /// Every existing child, in key order
    All,
    /// The last `n` existing children, in key order
    Last(usize),
}

/// Async stream of appended children
///
/// Dropping the stream (or calling [`ChildStream::close`]) unsubscribes it.
pub struct ChildStream {
    path: String,
    rx: mpsc::UnboundedReceiver<Child>,
}

impl ChildStream {
    pub(crate) fn new(path: String, rx: mpsc::UnboundedReceiver<Child>) -> Self {
        Self { path, rx }
    }

    /// Path this stream watches
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next appended child
    pub async fn recv(&mut self) -> Option<Child> {
        self.rx.recv().await
    }

    /// Take an already-delivered child without waiting
    pub fn try_recv(&mut self) -> Option<Child> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving; children already buffered are discarded
    pub fn close(mut self) {
        self.rx.close();
    }
}

impl std::fmt::Debug for ChildStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildStream").field("path", &self.path).finish()
    }
}

/// Split a slash-separated path into its segments
pub fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Join a parent path and a child key
pub fn child_path(parent: &str, key: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), key)
}
