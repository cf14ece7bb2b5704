//! Room bookkeeping routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::room::RoomError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomBody {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeBody {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_id: String,
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub exists: bool,
    pub is_public: bool,
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResult {
    pub authorized: bool,
}

/// `POST /api/rooms` — create a room, private when a password is given.
pub async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomBody>>,
) -> Result<Json<RoomCreated>, StatusCode> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let (room_id, settings) = state
        .rooms
        .create(body.password.as_deref())
        .await
        .map_err(room_error_to_status)?;
    Ok(Json(RoomCreated { room_id, is_public: settings.is_public() }))
}

/// `GET /api/rooms/{id}` — whether a room exists and needs a password.
///
/// Rooms without settings are open, matching the in-room gate.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>, StatusCode> {
    let exists = state
        .rooms
        .exists(&room_id)
        .await
        .map_err(room_error_to_status)?;
    let settings = state
        .rooms
        .settings(&room_id)
        .await
        .map_err(room_error_to_status)?;
    Ok(Json(RoomInfo {
        room_id,
        exists,
        is_public: settings.is_none_or(|s| s.is_public()),
        ice_servers: vec![state.config.stun_url.clone()],
    }))
}

/// `POST /api/rooms/{id}/auth` — check a password attempt.
pub async fn authorize(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<AuthorizeBody>,
) -> Result<Json<AuthResult>, StatusCode> {
    let authorized = state
        .rooms
        .authorize(&room_id, &body.password)
        .await
        .map_err(room_error_to_status)?;
    Ok(Json(AuthResult { authorized }))
}

pub(crate) fn room_error_to_status(err: RoomError) -> StatusCode {
    match err {
        RoomError::InvalidRoomId(_) | RoomError::Store(crate::store::StoreError::InvalidPath(_)) => {
            StatusCode::BAD_REQUEST
        }
        RoomError::NotAuthorized => StatusCode::FORBIDDEN,
        RoomError::Malformed(_) | RoomError::Store(_) => {
            warn!(error = %err, "rooms: request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
