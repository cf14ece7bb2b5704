//! Room creation and lookup.
//!
//! Rooms live in the shared state tree under `rooms/{id}`. Creating a room
//! writes its settings; nothing ever deletes a room.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::RoomError;
use super::gate;
use super::identity::random_base36;
use super::paths::RoomPaths;
use crate::store::SharedState;

const ROOM_ID_LEN: usize = 6;

/// Access settings of a room.
///
/// `is_public` is always `password.is_empty()`; [`RoomSettings::new`] is the
/// only way to build one outside deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    #[serde(default)]
    password: String,
    #[serde(default)]
    is_public: bool,
}

impl RoomSettings {
    #[must_use]
    pub fn new(password: Option<&str>) -> Self {
        let password = password.unwrap_or_default().to_owned();
        let is_public = password.is_empty();
        Self { password, is_public }
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// True when entering the room needs no password.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.password.is_empty()
    }
}

/// Creates rooms and answers questions about existing ones.
#[derive(Clone)]
pub struct RoomRegistry {
    store: Arc<dyn SharedState>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn SharedState>) -> Self {
        Self { store }
    }

    /// Create a room with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the settings cannot be written.
    pub async fn create(&self, password: Option<&str>) -> Result<(String, RoomSettings), RoomError> {
        let room_id = random_base36(ROOM_ID_LEN);
        let settings = self.create_with_id(&room_id, password).await?;
        Ok((room_id, settings))
    }

    /// Write settings for `room_id`, overwriting any previous settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoomId` for ids that cannot be used as a path segment.
    pub async fn create_with_id(&self, room_id: &str, password: Option<&str>) -> Result<RoomSettings, RoomError> {
        let paths = RoomPaths::new(room_id).map_err(|_| RoomError::InvalidRoomId(room_id.to_owned()))?;
        let settings = RoomSettings::new(password);
        let value = serde_json::to_value(&settings).map_err(|e| RoomError::Malformed(e.to_string()))?;
        self.store.write(&paths.settings(), value).await?;
        info!(%room_id, is_public = settings.is_public(), "room created");
        Ok(settings)
    }

    /// Stored settings of a room, if it has any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoomId` for malformed ids or a store error.
    pub async fn settings(&self, room_id: &str) -> Result<Option<RoomSettings>, RoomError> {
        let paths = RoomPaths::new(room_id).map_err(|_| RoomError::InvalidRoomId(room_id.to_owned()))?;
        let Some(value) = self.store.read(&paths.settings()).await? else {
            return Ok(None);
        };
        let raw: RoomSettings = serde_json::from_value(value).map_err(|e| RoomError::Malformed(e.to_string()))?;
        Ok(Some(RoomSettings::new(Some(raw.password()))))
    }

    /// True if anything at all is stored under the room.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoomId` for malformed ids or a store error.
    pub async fn exists(&self, room_id: &str) -> Result<bool, RoomError> {
        let paths = RoomPaths::new(room_id).map_err(|_| RoomError::InvalidRoomId(room_id.to_owned()))?;
        Ok(self.store.read(paths.room()).await?.is_some())
    }

    /// Check a password attempt against the room's settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoomId` for malformed ids or a store error.
    pub async fn authorize(&self, room_id: &str, attempt: &str) -> Result<bool, RoomError> {
        let settings = self.settings(room_id).await?;
        Ok(gate::password_matches(settings.as_ref(), attempt))
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
