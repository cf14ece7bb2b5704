use super::*;
use crate::state::test_helpers::test_app_state;

#[tokio::test]
async fn create_public_room() {
    let state = test_app_state();
    let Json(created) = create_room(State(state.clone()), None).await.unwrap();
    assert!(created.is_public);
    assert_eq!(created.room_id.len(), 6);
    assert!(state.rooms.exists(&created.room_id).await.unwrap());
}

#[tokio::test]
async fn create_private_room_and_authorize() {
    let state = test_app_state();
    let body = CreateRoomBody { password: Some("hunter2".into()) };
    let Json(created) = create_room(State(state.clone()), Some(Json(body))).await.unwrap();
    assert!(!created.is_public);

    let attempt = |password: &str| AuthorizeBody { password: password.into() };
    let Json(wrong) = authorize(State(state.clone()), Path(created.room_id.clone()), Json(attempt("HUNTER2")))
        .await
        .unwrap();
    assert!(!wrong.authorized);

    let Json(right) = authorize(State(state), Path(created.room_id), Json(attempt("hunter2")))
        .await
        .unwrap();
    assert!(right.authorized);
}

#[tokio::test]
async fn empty_password_makes_public_room() {
    let state = test_app_state();
    let body = CreateRoomBody { password: Some(String::new()) };
    let Json(created) = create_room(State(state), Some(Json(body))).await.unwrap();
    assert!(created.is_public);
}

#[tokio::test]
async fn unknown_room_is_open_and_absent() {
    let state = test_app_state();
    let Json(info) = get_room(State(state.clone()), Path("nothere".into())).await.unwrap();
    assert_eq!(
        info,
        RoomInfo {
            room_id: "nothere".into(),
            exists: false,
            is_public: true,
            ice_servers: vec!["stun:stun.l.google.com:19302".into()],
        }
    );

    let Json(auth) = authorize(State(state), Path("nothere".into()), Json(AuthorizeBody { password: "x".into() }))
        .await
        .unwrap();
    assert!(auth.authorized);
}

#[tokio::test]
async fn private_room_lookup() {
    let state = test_app_state();
    state.rooms.create_with_id("abc123", Some("pw")).await.unwrap();
    let Json(info) = get_room(State(state), Path("abc123".into())).await.unwrap();
    assert!(info.exists);
    assert!(!info.is_public);
}

#[tokio::test]
async fn invalid_room_id_is_bad_request() {
    let state = test_app_state();
    let err = get_room(State(state), Path("bad.id".into())).await.unwrap_err();
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[test]
fn room_error_to_status_maps_variants() {
    assert_eq!(room_error_to_status(RoomError::InvalidRoomId("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(room_error_to_status(RoomError::NotAuthorized), StatusCode::FORBIDDEN);
    assert_eq!(
        room_error_to_status(RoomError::Store(crate::store::StoreError::Disconnected)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn responses_use_camel_case() {
    let created = RoomCreated { room_id: "abc123".into(), is_public: true };
    assert_eq!(
        serde_json::to_value(&created).unwrap(),
        serde_json::json!({"roomId": "abc123", "isPublic": true})
    );
}
