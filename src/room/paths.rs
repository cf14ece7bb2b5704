//! Layout of one room inside the shared state tree.

use crate::store::{StatePath, StoreError};

/// Path builder rooted at `rooms/{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPaths {
    room_id: String,
    base: StatePath,
}

impl RoomPaths {
    /// # Errors
    ///
    /// Returns `InvalidPath` if the room id is empty or not a valid path segment.
    pub fn new(room_id: &str) -> Result<Self, StoreError> {
        let base = StatePath::root().child("rooms")?.child(room_id)?;
        Ok(Self { room_id: room_id.to_owned(), base })
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn room(&self) -> &StatePath {
        &self.base
    }

    #[must_use]
    pub fn settings(&self) -> StatePath {
        self.fixed(&["settings"])
    }

    #[must_use]
    pub fn users(&self) -> StatePath {
        self.fixed(&["users"])
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` for ids that are not valid path segments.
    pub fn user(&self, participant_id: &str) -> Result<StatePath, StoreError> {
        self.users().child(participant_id)
    }

    #[must_use]
    pub fn files(&self) -> StatePath {
        self.fixed(&["files"])
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` for ids that are not valid path segments.
    pub fn file(&self, file_id: &str) -> Result<StatePath, StoreError> {
        self.files().child(file_id)
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` for ids that are not valid path segments.
    pub fn file_content(&self, file_id: &str) -> Result<StatePath, StoreError> {
        self.file(file_id)?.child("content")
    }

    #[must_use]
    pub fn versions(&self) -> StatePath {
        self.fixed(&["versions"])
    }

    #[must_use]
    pub fn chat(&self) -> StatePath {
        self.fixed(&["chat"])
    }

    #[must_use]
    pub fn call(&self) -> StatePath {
        self.fixed(&["call"])
    }

    #[must_use]
    pub fn call_offer(&self) -> StatePath {
        self.fixed(&["call", "offer"])
    }

    #[must_use]
    pub fn call_answer(&self) -> StatePath {
        self.fixed(&["call", "answer"])
    }

    #[must_use]
    pub fn call_candidates(&self) -> StatePath {
        self.fixed(&["call", "candidates"])
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` for ids that are not valid path segments.
    pub fn call_candidates_for(&self, participant_id: &str) -> Result<StatePath, StoreError> {
        self.call_candidates().child(participant_id)
    }

    fn fixed(&self, segments: &[&str]) -> StatePath {
        let mut path = self.base.clone();
        for segment in segments {
            // Literal segments above are always valid.
            if let Ok(next) = path.child(segment) {
                path = next;
            }
        }
        path
    }
}
