//! Room — everything one participant does inside a room.
//!
//! ARCHITECTURE
//! ============
//! Components sit on top of a `SharedState` connection and never talk to
//! each other directly. Each one owns the subscriptions it needs and
//! recomputes its local view from every pushed value:
//!
//! - `gate`     : password check before anything else starts
//! - `presence` : who is here
//! - `files`    : the shared file set, per-keystroke content writes
//! - `snapshots`: saved copies of the file set, restore
//! - `chat`     : append-only message stream
//! - `call`     : two-party voice call negotiation
//!
//! `session` wires them together behind the gate. `registry` creates rooms
//! and serves the HTTP surface.

pub mod call;
pub mod chat;
pub mod files;
pub mod gate;
pub mod identity;
pub mod paths;
pub mod presence;
pub mod registry;
pub mod session;
pub mod snapshots;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::frame::ErrorCode;
use crate::store::StoreError;

pub use gate::{AccessGate, GateState};
pub use identity::{Participant, SessionIdentity};
pub use paths::RoomPaths;
pub use registry::{RoomRegistry, RoomSettings};
pub use session::RoomSession;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),
    #[error("malformed room data: {0}")]
    Malformed(String),
    #[error("room access not authorized")]
    NotAuthorized,
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::InvalidRoomId(_) => "E_INVALID_ROOM_ID",
            Self::Malformed(_) => "E_MALFORMED",
            Self::NotAuthorized => "E_NOT_AUTHORIZED",
        }
    }
}

/// Decode the children of a keyed collection, in key order.
///
/// Children that do not match `T` are logged and skipped.
pub(crate) fn decode_children<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<(String, T)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, child)| match serde_json::from_value::<T>(child.clone()) {
            Ok(item) => Some((key.clone(), item)),
            Err(e) => {
                warn!(%key, error = %e, "room: skipping malformed {what} entry");
                None
            }
        })
        .collect()
}
