//! Presence tracker — who is currently in the room.
//!
//! Joining writes this session's entry under `users/{pid}` and arranges for
//! the store to delete it when the connection goes away. The visible list is
//! rebuilt from every value pushed for `users`, in key order.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::identity::{Participant, SessionIdentity};
use super::paths::RoomPaths;
use super::{RoomError, decode_children};
use crate::store::{SharedState, StoreEvent, Subscription, WatchMode};

pub struct PresenceTracker {
    store: Arc<dyn SharedState>,
    paths: RoomPaths,
    identity: SessionIdentity,
    subscription: Option<Subscription>,
    participants: Vec<Participant>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new(store: Arc<dyn SharedState>, paths: RoomPaths, identity: SessionIdentity) -> Self {
        Self { store, paths, identity, subscription: None, participants: Vec::new() }
    }

    /// Announce this participant and start watching the presence set.
    ///
    /// # Errors
    ///
    /// Returns a store error if the entry cannot be written or watched.
    pub async fn join(&mut self) -> Result<(), RoomError> {
        let entry = self.paths.user(self.identity.id())?;
        let value = serde_json::to_value(self.identity.participant()).map_err(|e| RoomError::Malformed(e.to_string()))?;
        self.store.write(&entry, value).await?;
        self.store.remove_on_disconnect(&entry).await?;

        let mut subscription = self.store.subscribe(&self.paths.users(), WatchMode::Value).await?;
        if let Some(StoreEvent::Value(initial)) = subscription.next().await {
            self.apply(initial.as_ref());
        }
        self.subscription = Some(subscription);
        info!(room_id = %self.paths.room_id(), participant = %self.identity.id(), "presence: joined");
        Ok(())
    }

    /// Participants currently in the room, in key order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Wait for the next presence change. `None` when not joined or the
    /// connection is gone.
    pub async fn next_update(&mut self) -> Option<&[Participant]> {
        let event = self.subscription.as_mut()?.next().await?;
        if let StoreEvent::Value(value) = event {
            self.apply(value.as_ref());
        }
        Some(&self.participants)
    }

    /// Remove this participant's entry now instead of waiting for disconnect.
    ///
    /// # Errors
    ///
    /// Returns a store error if the entry cannot be removed.
    pub async fn leave(&mut self) -> Result<(), RoomError> {
        self.subscription = None;
        self.participants.clear();
        let entry = self.paths.user(self.identity.id())?;
        self.store.remove(&entry).await?;
        info!(room_id = %self.paths.room_id(), participant = %self.identity.id(), "presence: left");
        Ok(())
    }

    fn apply(&mut self, value: Option<&Value>) {
        self.participants = decode_children::<Participant>(value, "presence")
            .into_iter()
            .map(|(_, participant)| participant)
            .collect();
        debug!(room_id = %self.paths.room_id(), count = self.participants.len(), "presence: updated");
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
