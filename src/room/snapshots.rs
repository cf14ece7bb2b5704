//! Snapshot manager — saved copies of the room's file set.
//!
//! Snapshots are immutable once pushed. Restoring one wipes the live file
//! set and re-creates every file under a fresh id, so file ids never survive
//! a restore.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::files::{DocumentSync, FileBody, FileEntry};
use super::paths::RoomPaths;
use super::{RoomError, decode_children};
use crate::frame::now_ms;
use crate::store::{SharedState, StoreEvent, Subscription, WatchMode};

/// Stored shape under `versions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody {
    #[serde(default)]
    user: String,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    files: Vec<FileBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub user: String,
    pub created_at: i64,
    pub files: Vec<FileBody>,
}

pub struct SnapshotManager {
    store: Arc<dyn SharedState>,
    paths: RoomPaths,
    user_name: String,
    subscription: Option<Subscription>,
    snapshots: Vec<Snapshot>,
}

impl SnapshotManager {
    #[must_use]
    pub fn new(store: Arc<dyn SharedState>, paths: RoomPaths, user_name: &str) -> Self {
        Self { store, paths, user_name: user_name.to_owned(), subscription: None, snapshots: Vec::new() }
    }

    /// Start watching the snapshot list.
    ///
    /// # Errors
    ///
    /// Returns a store error if the subscription cannot be opened.
    pub async fn open(&mut self) -> Result<(), RoomError> {
        let mut subscription = self.store.subscribe(&self.paths.versions(), WatchMode::Value).await?;
        if let Some(StoreEvent::Value(initial)) = subscription.next().await {
            self.apply(initial.as_ref());
        }
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Snapshots, newest first.
    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub async fn next_change(&mut self) -> Option<&[Snapshot]> {
        let event = self.subscription.as_mut()?.next().await?;
        if let StoreEvent::Value(value) = event {
            self.apply(value.as_ref());
        }
        Some(&self.snapshots)
    }

    /// Save the given files as a new snapshot and return its id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the snapshot cannot be pushed.
    pub async fn save_snapshot(&self, files: &[FileEntry]) -> Result<String, RoomError> {
        let body = SnapshotBody {
            user: self.user_name.clone(),
            created_at: now_ms(),
            files: files
                .iter()
                .map(|f| FileBody { name: f.name.clone(), content: f.content.clone() })
                .collect(),
        };
        let value = serde_json::to_value(&body).map_err(|e| RoomError::Malformed(e.to_string()))?;
        let id = self.store.push(&self.paths.versions(), value).await?;
        info!(room_id = %self.paths.room_id(), snapshot_id = %id, files = body.files.len(), "snapshots: saved");
        Ok(id)
    }

    /// Replace the live file set with the snapshot's files.
    ///
    /// # Errors
    ///
    /// Returns a store error if the file set cannot be rewritten.
    pub async fn restore_snapshot(&self, snapshot: &Snapshot, docs: &mut DocumentSync) -> Result<(), RoomError> {
        // Pending edits must not land on top of the restored set.
        docs.flush().await;
        let files = self.paths.files();
        self.store.remove(&files).await?;
        for file in &snapshot.files {
            let value = serde_json::to_value(file).map_err(|e| RoomError::Malformed(e.to_string()))?;
            self.store.push(&files, value).await?;
        }
        docs.clear_active();
        info!(room_id = %self.paths.room_id(), snapshot_id = %snapshot.id, "snapshots: restored");
        Ok(())
    }

    fn apply(&mut self, value: Option<&Value>) {
        let mut snapshots: Vec<Snapshot> = decode_children::<SnapshotBody>(value, "snapshot")
            .into_iter()
            .map(|(id, body)| Snapshot { id, user: body.user, created_at: body.created_at, files: body.files })
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.snapshots = snapshots;
        debug!(room_id = %self.paths.room_id(), count = self.snapshots.len(), "snapshots: updated");
    }
}

#[cfg(test)]
#[path = "snapshots_test.rs"]
mod tests;
