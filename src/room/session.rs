//! Room session — one participant's visit to one room.
//!
//! Nothing but the gate runs until the session is authorized. Once it is,
//! presence is announced and the file, snapshot and chat views are opened.
//! Mutable access to the components is refused before that point.

use std::sync::Arc;

use tracing::info;

use super::RoomError;
use super::call::{CallNegotiator, CallState, MediaBackend, PeerConfig};
use super::chat::ChatStream;
use super::files::DocumentSync;
use super::gate::{AccessGate, GateState};
use super::identity::SessionIdentity;
use super::paths::RoomPaths;
use super::presence::PresenceTracker;
use super::registry::RoomRegistry;
use super::snapshots::SnapshotManager;
use crate::store::SharedState;

pub struct RoomSession {
    paths: RoomPaths,
    identity: SessionIdentity,
    registry: RoomRegistry,
    gate: AccessGate,
    started: bool,
    presence: PresenceTracker,
    files: DocumentSync,
    snapshots: SnapshotManager,
    chat: ChatStream,
    call: CallNegotiator,
}

impl RoomSession {
    /// # Errors
    ///
    /// Returns `InvalidRoomId` if the id cannot be used as a path segment.
    pub fn new(
        store: Arc<dyn SharedState>,
        room_id: &str,
        identity: SessionIdentity,
        media: Arc<dyn MediaBackend>,
        peer_config: PeerConfig,
    ) -> Result<Self, RoomError> {
        let paths = RoomPaths::new(room_id).map_err(|_| RoomError::InvalidRoomId(room_id.to_owned()))?;
        Ok(Self {
            registry: RoomRegistry::new(Arc::clone(&store)),
            gate: AccessGate::new(),
            started: false,
            presence: PresenceTracker::new(Arc::clone(&store), paths.clone(), identity.clone()),
            files: DocumentSync::new(Arc::clone(&store), paths.clone()),
            snapshots: SnapshotManager::new(Arc::clone(&store), paths.clone(), identity.name()),
            chat: ChatStream::new(Arc::clone(&store), paths.clone(), identity.name()),
            call: CallNegotiator::new(store, paths.clone(), identity.id(), media, peer_config),
            paths,
            identity,
        })
    }

    /// Read the room settings and run the gate. Starts the room views when
    /// no password is needed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the settings or the views cannot be loaded.
    pub async fn load(&mut self) -> Result<GateState, RoomError> {
        let settings = self.registry.settings(self.paths.room_id()).await?;
        let state = self.gate.on_settings(settings);
        self.start_if_authorized().await?;
        Ok(state)
    }

    /// Try a password.
    ///
    /// # Errors
    ///
    /// Returns a store error if the views cannot be started after success.
    pub async fn submit_password(&mut self, attempt: &str) -> Result<GateState, RoomError> {
        let state = self.gate.submit(attempt);
        self.start_if_authorized().await?;
        Ok(state)
    }

    async fn start_if_authorized(&mut self) -> Result<(), RoomError> {
        if self.started || !self.gate.is_authorized() {
            return Ok(());
        }
        self.presence.join().await?;
        self.files.open().await?;
        self.snapshots.open().await?;
        self.chat.open().await?;
        self.started = true;
        info!(room_id = %self.paths.room_id(), participant = %self.identity.id(), "session: started");
        Ok(())
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        self.paths.room_id()
    }

    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    #[must_use]
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.gate.is_authorized()
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    #[must_use]
    pub fn files(&self) -> &DocumentSync {
        &self.files
    }

    #[must_use]
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    #[must_use]
    pub fn call(&self) -> &CallNegotiator {
        &self.call
    }

    /// # Errors
    ///
    /// Returns `NotAuthorized` until the gate has opened.
    pub fn presence_mut(&mut self) -> Result<&mut PresenceTracker, RoomError> {
        self.ensure_started()?;
        Ok(&mut self.presence)
    }

    /// # Errors
    ///
    /// Returns `NotAuthorized` until the gate has opened.
    pub fn files_mut(&mut self) -> Result<&mut DocumentSync, RoomError> {
        self.ensure_started()?;
        Ok(&mut self.files)
    }

    /// # Errors
    ///
    /// Returns `NotAuthorized` until the gate has opened.
    pub fn snapshots_mut(&mut self) -> Result<&mut SnapshotManager, RoomError> {
        self.ensure_started()?;
        Ok(&mut self.snapshots)
    }

    /// # Errors
    ///
    /// Returns `NotAuthorized` until the gate has opened.
    pub fn chat_mut(&mut self) -> Result<&mut ChatStream, RoomError> {
        self.ensure_started()?;
        Ok(&mut self.chat)
    }

    /// Write new content for the active file. Ignored when unauthorized or
    /// when no file is active.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for malformed file ids.
    pub fn edit_active(&mut self, content: &str) -> Result<bool, RoomError> {
        if !self.started {
            return Ok(false);
        }
        let Some(id) = self.files.active_id().map(str::to_owned) else {
            return Ok(false);
        };
        self.files.update_content(&id, content)?;
        Ok(true)
    }

    /// Save the current file set as a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthorized` before the gate opens, or a store error.
    pub async fn save_snapshot(&self) -> Result<String, RoomError> {
        self.ensure_started()?;
        self.snapshots.save_snapshot(self.files.files()).await
    }

    /// Restore the snapshot with the given id. Unknown ids do nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthorized` before the gate opens, or a store error.
    pub async fn restore_snapshot(&mut self, snapshot_id: &str) -> Result<bool, RoomError> {
        self.ensure_started()?;
        let Some(snapshot) = self.snapshots.snapshots().iter().find(|s| s.id == snapshot_id).cloned() else {
            return Ok(false);
        };
        self.snapshots.restore_snapshot(&snapshot, &mut self.files).await?;
        Ok(true)
    }

    /// Join the voice call. Does nothing unless authorized.
    pub fn join_call(&mut self) -> CallState {
        self.call.join(self.gate.is_authorized())
    }

    pub fn leave_call(&mut self) {
        self.call.leave();
    }

    /// Hang up and withdraw from presence.
    ///
    /// # Errors
    ///
    /// Returns a store error if the presence entry cannot be removed.
    pub async fn close(mut self) -> Result<(), RoomError> {
        self.call.leave();
        if self.started {
            self.presence.leave().await?;
        }
        info!(room_id = %self.paths.room_id(), participant = %self.identity.id(), "session: closed");
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), RoomError> {
        if self.started { Ok(()) } else { Err(RoomError::NotAuthorized) }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
