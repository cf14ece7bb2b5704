//! Shared state tree — the push-based hierarchical store every participant
//! reads, writes and subscribes to.
//!
//! ARCHITECTURE
//! ============
//! `SharedState` is the seam between room components and the store. The
//! in-process implementation is [`MemoryStore`]; each participant talks to it
//! through its own [`StoreConnection`], which owns the participant's
//! subscriptions and on-disconnect removals. Remote participants get a
//! connection per websocket (see `routes::ws`).
//!
//! DESIGN
//! ======
//! - Last write wins at the granularity of the written path. There is no
//!   merge, no versioning, no transaction.
//! - Updates for a path reach each subscriber in write order. Nothing is
//!   promised across paths.
//! - Writing `null` deletes; empty objects are never stored.

mod memory;
pub mod path;
pub mod push_id;
mod tree;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

pub use memory::{MemoryStore, StoreConnection};
pub use path::StatePath;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("connection is closed")]
    Disconnected,
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "E_INVALID_PATH",
            Self::Disconnected => "E_DISCONNECTED",
        }
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// What a subscription reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// The whole value at the path, now and after every change.
    Value,
    /// Each direct child exactly once: existing ones first, then new arrivals.
    ChildAdded,
}

impl WatchMode {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "value" => Some(Self::Value),
            "child_added" => Some(Self::ChildAdded),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::ChildAdded => "child_added",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Current value at the watched path; `None` when nothing is stored.
    Value(Option<Value>),
    ChildAdded { key: String, value: Value },
}

/// Receiving end of a `subscribe` call. Dropping it ends the subscription.
pub struct Subscription {
    path: StatePath,
    mode: WatchMode,
    rx: mpsc::UnboundedReceiver<StoreEvent>,
}

impl Subscription {
    pub(crate) fn new(path: StatePath, mode: WatchMode, rx: mpsc::UnboundedReceiver<StoreEvent>) -> Self {
        Self { path, mode, rx }
    }

    #[must_use]
    pub fn path(&self) -> &StatePath {
        &self.path
    }

    #[must_use]
    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Wait for the next event. `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Subscription::next`].
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        self.rx.try_recv().ok()
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

/// One participant's view of the shared state tree.
#[async_trait]
pub trait SharedState: Send + Sync {
    /// Read the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn read(&self, path: &StatePath) -> Result<Option<Value>, StoreError>;

    /// Replace the value at `path`. `Value::Null` deletes.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn write(&self, path: &StatePath, value: Value) -> Result<(), StoreError>;

    /// Write `value` under a fresh time-ordered child key and return the key.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn push(&self, path: &StatePath, value: Value) -> Result<String, StoreError>;

    /// Delete the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn remove(&self, path: &StatePath) -> Result<(), StoreError> {
        self.write(path, Value::Null).await
    }

    /// Subscribe to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn subscribe(&self, path: &StatePath, mode: WatchMode) -> Result<Subscription, StoreError>;

    /// Delete `path` when this connection goes away.
    ///
    /// # Errors
    ///
    /// Returns `Disconnected` once the connection has been closed.
    async fn remove_on_disconnect(&self, path: &StatePath) -> Result<(), StoreError>;
}
