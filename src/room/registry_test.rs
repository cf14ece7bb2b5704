use super::*;
use crate::store::MemoryStore;
use serde_json::json;

fn registry() -> (MemoryStore, RoomRegistry) {
    let store = MemoryStore::new();
    let registry = RoomRegistry::new(Arc::new(store.connect()));
    (store, registry)
}

#[test]
fn settings_public_iff_password_empty() {
    assert!(RoomSettings::new(None).is_public());
    assert!(RoomSettings::new(Some("")).is_public());
    assert!(!RoomSettings::new(Some("secret")).is_public());
}

#[test]
fn settings_serialize_camel_case() {
    let json = serde_json::to_value(RoomSettings::new(Some("pw"))).unwrap();
    assert_eq!(json, json!({"password": "pw", "isPublic": false}));
}

#[tokio::test]
async fn create_generates_six_char_id() {
    let (_store, registry) = registry();
    let (room_id, settings) = registry.create(None).await.unwrap();
    assert_eq!(room_id.len(), 6);
    assert!(room_id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert!(settings.is_public());
    assert!(registry.exists(&room_id).await.unwrap());
}

#[tokio::test]
async fn create_writes_settings_to_tree() {
    let (store, registry) = registry();
    registry.create_with_id("abc123", Some("pw")).await.unwrap();

    let reader = store.connect();
    let path = crate::store::StatePath::parse("rooms/abc123/settings").unwrap();
    assert_eq!(reader.read(&path).await.unwrap(), Some(json!({"password": "pw", "isPublic": false})));
}

#[tokio::test]
async fn recreate_overwrites_settings() {
    let (_store, registry) = registry();
    registry.create_with_id("abc123", Some("pw")).await.unwrap();
    registry.create_with_id("abc123", None).await.unwrap();

    let settings = registry.settings("abc123").await.unwrap().unwrap();
    assert!(settings.is_public());
}

#[tokio::test]
async fn unknown_room_has_no_settings() {
    let (_store, registry) = registry();
    assert!(registry.settings("nope00").await.unwrap().is_none());
    assert!(!registry.exists("nope00").await.unwrap());
}

#[tokio::test]
async fn stored_settings_with_inconsistent_flag_are_normalized() {
    let (store, registry) = registry();
    let writer = store.connect();
    let path = crate::store::StatePath::parse("rooms/r1/settings").unwrap();
    writer.write(&path, json!({"password": "x", "isPublic": true})).await.unwrap();

    let settings = registry.settings("r1").await.unwrap().unwrap();
    assert!(!settings.is_public());
}

#[tokio::test]
async fn authorize_checks_password_exactly() {
    let (_store, registry) = registry();
    registry.create_with_id("priv01", Some("Secret")).await.unwrap();

    assert!(registry.authorize("priv01", "Secret").await.unwrap());
    assert!(!registry.authorize("priv01", "secret").await.unwrap());
    assert!(!registry.authorize("priv01", "Secret ").await.unwrap());
    assert!(registry.authorize("missing", "anything").await.unwrap());
}

#[tokio::test]
async fn invalid_room_id_is_rejected() {
    let (_store, registry) = registry();
    assert!(matches!(
        registry.create_with_id("a.b", None).await,
        Err(RoomError::InvalidRoomId(_))
    ));
}
