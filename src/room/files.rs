//! Document store sync — the room's shared file set.
//!
//! DESIGN
//! ======
//! The file list is rebuilt from every value pushed for `files`, ordered by
//! push key (creation order). Content edits update the local list at once
//! and queue a write of `files/{id}/content` for a single writer task that
//! drains the queue in order: no acknowledgement, no rollback, last write
//! wins. Two people typing in the same file overwrite each other wholesale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::paths::RoomPaths;
use super::{RoomError, decode_children};
use crate::store::{SharedState, StatePath, StoreEvent, Subscription, WatchMode};

/// One file of the room, as seen locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub content: String,
}

/// The stored shape under `files/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

enum WriteOp {
    Content { path: StatePath, value: Value },
    Flush(oneshot::Sender<()>),
}

pub struct DocumentSync {
    store: Arc<dyn SharedState>,
    paths: RoomPaths,
    subscription: Option<Subscription>,
    files: Vec<FileEntry>,
    active: Option<String>,
    writer: Option<mpsc::UnboundedSender<WriteOp>>,
}

impl DocumentSync {
    #[must_use]
    pub fn new(store: Arc<dyn SharedState>, paths: RoomPaths) -> Self {
        Self { store, paths, subscription: None, files: Vec::new(), active: None, writer: None }
    }

    /// Start watching the file set and load its current state.
    ///
    /// # Errors
    ///
    /// Returns a store error if the subscription cannot be opened.
    pub async fn open(&mut self) -> Result<(), RoomError> {
        let mut subscription = self.store.subscribe(&self.paths.files(), WatchMode::Value).await?;
        if let Some(StoreEvent::Value(initial)) = subscription.next().await {
            self.apply(initial.as_ref());
        }
        self.subscription = Some(subscription);
        Ok(())
    }

    #[must_use]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn active_file(&self) -> Option<&FileEntry> {
        let active = self.active.as_deref()?;
        self.files.iter().find(|f| f.id == active)
    }

    /// Make `id` the active file. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.files.iter().any(|f| f.id == id) {
            return false;
        }
        self.active = Some(id.to_owned());
        true
    }

    /// Forget the active file; the next update picks the first one.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Wait for the next change of the file set. `None` when not open or the
    /// connection is gone.
    pub async fn next_change(&mut self) -> Option<&[FileEntry]> {
        let event = self.subscription.as_mut()?.next().await?;
        if let StoreEvent::Value(value) = event {
            self.apply(value.as_ref());
        }
        Some(&self.files)
    }

    /// Create an empty file and make it active. Blank names are ignored.
    ///
    /// # Errors
    ///
    /// Returns a store error if the entry cannot be pushed.
    pub async fn create_file(&mut self, name: &str) -> Result<Option<String>, RoomError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let id = self.store.push(&self.paths.files(), json!({"name": name, "content": ""})).await?;
        info!(room_id = %self.paths.room_id(), file_id = %id, %name, "files: created");
        self.active = Some(id.clone());
        Ok(Some(id))
    }

    /// Delete a file after `confirm` agrees. There is no undo.
    ///
    /// `confirm` receives the file's name, or its id when the file is not in
    /// the local list.
    ///
    /// # Errors
    ///
    /// Returns a store error if the entry cannot be removed.
    pub async fn delete_file(&self, id: &str, confirm: impl FnOnce(&str) -> bool) -> Result<bool, RoomError> {
        let label = self.files.iter().find(|f| f.id == id).map_or(id, |f| f.name.as_str());
        if !confirm(label) {
            return Ok(false);
        }
        self.store.remove(&self.paths.file(id)?).await?;
        info!(room_id = %self.paths.room_id(), file_id = %id, "files: deleted");
        Ok(true)
    }

    /// Replace a file's content locally and publish it without waiting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for ids that are not valid path segments. Write
    /// failures are only logged.
    pub fn update_content(&mut self, id: &str, content: &str) -> Result<(), RoomError> {
        let path = self.paths.file_content(id)?;
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            file.content = content.to_owned();
        }

        let value = Value::String(content.to_owned());
        if self.writer().send(WriteOp::Content { path, value }).is_err() {
            warn!(file_id = %id, "files: content writer gone");
        }
        Ok(())
    }

    /// Wait until every content write queued so far has reached the store.
    pub async fn flush(&mut self) {
        let (tx, rx) = oneshot::channel();
        if self.writer().send(WriteOp::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn writer(&mut self) -> &mpsc::UnboundedSender<WriteOp> {
        let store = &self.store;
        self.writer.get_or_insert_with(|| spawn_writer(Arc::clone(store)))
    }

    fn apply(&mut self, value: Option<&Value>) {
        let was_listed = self.active_file().is_some();
        self.files = decode_children::<FileBody>(value, "file")
            .into_iter()
            .map(|(id, body)| FileEntry { id, name: body.name, content: body.content })
            .collect();

        // A freshly created file may not be listed yet; only a file that
        // disappeared from the list loses the active slot.
        let vanished = was_listed && self.active_file().is_none();
        if self.active.is_none() || vanished {
            self.active = self.files.first().map(|f| f.id.clone());
        }
        debug!(room_id = %self.paths.room_id(), count = self.files.len(), "files: updated");
    }
}

/// One writer per document set keeps content writes in issue order. The task
/// ends when the owning [`DocumentSync`] is dropped and the queue drains.
fn spawn_writer(store: Arc<dyn SharedState>) -> mpsc::UnboundedSender<WriteOp> {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                WriteOp::Content { path, value } => {
                    if let Err(e) = store.write(&path, value).await {
                        warn!(%path, error = %e, "files: content write failed");
                    }
                }
                WriteOp::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    });
    tx
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
