use super::*;
use crate::store::MemoryStore;
use serde_json::json;
use tokio::time::{Duration, timeout};

fn gateway(store: &MemoryStore) -> (Gateway, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Gateway::new(store.connect(), tx), rx)
}

fn request(syscall: &str, data: serde_json::Value) -> (Frame, String) {
    let data: Data = serde_json::from_value(data).unwrap();
    let frame = Frame::request(syscall, data);
    let text = serde_json::to_string(&frame).unwrap();
    (frame, text)
}

/// Send one request and return its single reply.
async fn call(gw: &mut Gateway, syscall: &str, data: serde_json::Value) -> Frame {
    let (req, text) = request(syscall, data);
    let mut replies = process_inbound_text(gw, &text).await;
    assert_eq!(replies.len(), 1, "expected exactly one reply");
    let reply = replies.remove(0);
    assert_eq!(reply.parent_id, Some(req.id));
    reply
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("event channel closed unexpectedly")
}

async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no event frame"
    );
}

fn code(frame: &Frame) -> Option<&str> {
    frame.str_field("code")
}

// =============================================================================
// REQUEST / REPLY
// =============================================================================

#[tokio::test]
async fn write_then_read() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);

    let done = call(&mut gw, "store:write", json!({"path": "rooms/r1/settings", "value": {"password": "", "isPublic": true}})).await;
    assert_eq!(done.status, Status::Done);
    assert!(done.data.is_empty());

    let read = call(&mut gw, "store:read", json!({"path": "rooms/r1/settings/isPublic"})).await;
    assert_eq!(read.status, Status::Done);
    assert_eq!(read.data.get("value"), Some(&json!(true)));
}

#[tokio::test]
async fn read_missing_is_null() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    let read = call(&mut gw, "store:read", json!({"path": "rooms/nope"})).await;
    assert_eq!(read.data.get("value"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn push_returns_key_and_remove_deletes() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);

    let pushed = call(&mut gw, "store:push", json!({"path": "rooms/r1/chat", "value": {"text": "hi", "userName": "User-abcd"}})).await;
    let key = pushed.str_field("key").unwrap().to_owned();
    assert_eq!(key.len(), 20);

    let read = call(&mut gw, "store:read", json!({"path": format!("rooms/r1/chat/{key}/text")})).await;
    assert_eq!(read.data.get("value"), Some(&json!("hi")));

    let removed = call(&mut gw, "store:remove", json!({"path": format!("rooms/r1/chat/{key}")})).await;
    assert_eq!(removed.status, Status::Done);
    let read = call(&mut gw, "store:read", json!({"path": "rooms/r1"})).await;
    assert_eq!(read.data.get("value"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn write_null_deletes() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    call(&mut gw, "store:write", json!({"path": "a/b", "value": 1})).await;
    let done = call(&mut gw, "store:write", json!({"path": "a/b", "value": null})).await;
    assert_eq!(done.status, Status::Done);
    let read = call(&mut gw, "store:read", json!({"path": "a"})).await;
    assert_eq!(read.data.get("value"), Some(&serde_json::Value::Null));
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[tokio::test]
async fn value_subscription_streams_changes() {
    let store = MemoryStore::new();
    let (mut watcher, mut events) = gateway(&store);
    let (mut writer, _rx) = gateway(&store);

    let sub = call(&mut watcher, "store:subscribe", json!({"path": "rooms/r1/users", "mode": "value"})).await;
    let sub_id = sub.str_field("subscription").unwrap().to_owned();

    let initial = next_event(&mut events).await;
    assert_eq!(initial.syscall, "store:event");
    assert_eq!(initial.status, Status::Request);
    assert_eq!(initial.str_field("subscription"), Some(sub_id.as_str()));
    assert_eq!(initial.str_field("kind"), Some("value"));
    assert_eq!(initial.data.get("value"), Some(&serde_json::Value::Null));
    assert!(!initial.data.contains_key("key"));

    call(&mut writer, "store:write", json!({"path": "rooms/r1/users/u1", "value": {"id": "u1"}})).await;
    let changed = next_event(&mut events).await;
    assert_eq!(changed.data.get("value"), Some(&json!({"u1": {"id": "u1"}})));
}

#[tokio::test]
async fn subscribe_defaults_to_value_mode() {
    let store = MemoryStore::new();
    let (mut gw, mut events) = gateway(&store);
    call(&mut gw, "store:subscribe", json!({"path": "x"})).await;
    assert_eq!(next_event(&mut events).await.str_field("kind"), Some("value"));
}

#[tokio::test]
async fn child_added_subscription_carries_keys() {
    let store = MemoryStore::new();
    let (mut gw, mut events) = gateway(&store);
    let first = call(&mut gw, "store:push", json!({"path": "rooms/r1/chat", "value": {"text": "one"}})).await;
    let first_key = first.str_field("key").unwrap().to_owned();

    call(&mut gw, "store:subscribe", json!({"path": "rooms/r1/chat", "mode": "child_added"})).await;
    let existing = next_event(&mut events).await;
    assert_eq!(existing.str_field("kind"), Some("child_added"));
    assert_eq!(existing.str_field("key"), Some(first_key.as_str()));
    assert_eq!(existing.data.get("value"), Some(&json!({"text": "one"})));

    let second = call(&mut gw, "store:push", json!({"path": "rooms/r1/chat", "value": {"text": "two"}})).await;
    let added = next_event(&mut events).await;
    assert_eq!(added.str_field("key"), second.str_field("key"));
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn unsubscribe_stops_events() {
    let store = MemoryStore::new();
    let (mut gw, mut events) = gateway(&store);
    let sub = call(&mut gw, "store:subscribe", json!({"path": "x"})).await;
    let sub_id = sub.str_field("subscription").unwrap().to_owned();
    next_event(&mut events).await;

    let done = call(&mut gw, "store:unsubscribe", json!({"subscription": sub_id})).await;
    assert_eq!(done.status, Status::Done);

    call(&mut gw, "store:write", json!({"path": "x", "value": 1})).await;
    assert_no_event(&mut events).await;

    let again = call(&mut gw, "store:unsubscribe", json!({"subscription": sub_id})).await;
    assert_eq!(again.status, Status::Error);
}

#[tokio::test]
async fn close_fires_on_disconnect_removals() {
    let store = MemoryStore::new();
    let (mut watcher, mut events) = gateway(&store);
    let (mut leaver, _rx) = gateway(&store);

    call(&mut leaver, "store:write", json!({"path": "rooms/r1/users/u2", "value": {"id": "u2"}})).await;
    call(&mut leaver, "store:on_disconnect", json!({"path": "rooms/r1/users/u2"})).await;
    call(&mut leaver, "store:subscribe", json!({"path": "rooms/r1"})).await;

    call(&mut watcher, "store:subscribe", json!({"path": "rooms/r1/users"})).await;
    assert_eq!(next_event(&mut events).await.data.get("value"), Some(&json!({"u2": {"id": "u2"}})));

    leaver.close();
    assert_eq!(next_event(&mut events).await.data.get("value"), Some(&serde_json::Value::Null));
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn invalid_path_is_structured_error() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    let err = call(&mut gw, "store:read", json!({"path": "rooms/a.b"})).await;
    assert_eq!(err.status, Status::Error);
    assert_eq!(code(&err), Some("E_INVALID_PATH"));
    assert_eq!(err.data.get("retryable"), Some(&json!(false)));
}

#[tokio::test]
async fn missing_fields_are_errors() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);

    let err = call(&mut gw, "store:read", json!({})).await;
    assert_eq!(err.str_field("message"), Some("path required"));

    let err = call(&mut gw, "store:write", json!({"path": "x"})).await;
    assert_eq!(err.str_field("message"), Some("value required"));

    let err = call(&mut gw, "store:unsubscribe", json!({})).await;
    assert_eq!(err.str_field("message"), Some("subscription required"));
}

#[tokio::test]
async fn unknown_ops_modes_and_prefixes() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);

    let err = call(&mut gw, "store:transaction", json!({"path": "x"})).await;
    assert_eq!(err.str_field("message"), Some("unknown store op: transaction"));

    let err = call(&mut gw, "store:subscribe", json!({"path": "x", "mode": "child_changed"})).await;
    assert_eq!(err.str_field("message"), Some("unknown mode: child_changed"));

    let err = call(&mut gw, "media:offer", json!({})).await;
    assert_eq!(err.str_field("message"), Some("unknown prefix: media"));
}

#[tokio::test]
async fn invalid_json_yields_gateway_error() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    let replies = process_inbound_text(&mut gw, "{nope").await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].syscall, "gateway:error");
    assert!(replies[0].str_field("message").unwrap().starts_with("invalid json"));
}

#[tokio::test]
async fn non_request_frames_are_rejected() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    let (req, _) = request("store:read", json!({"path": "x"}));
    let text = serde_json::to_string(&req.done()).unwrap();
    let replies = process_inbound_text(&mut gw, &text).await;
    assert_eq!(replies[0].status, Status::Error);
}

#[tokio::test]
async fn closed_connection_reports_disconnected() {
    let store = MemoryStore::new();
    let (mut gw, _rx) = gateway(&store);
    gw.conn.disconnect();
    let err = call(&mut gw, "store:read", json!({"path": "x"})).await;
    assert_eq!(code(&err), Some("E_DISCONNECTED"));
}

// =============================================================================
// END TO END
// =============================================================================

mod socket {
    use super::*;
    use crate::state::test_helpers::test_app_state;
    use futures::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn serve() -> SocketAddr {
        let app = crate::routes::app(test_app_state());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (mut client, _) = connect_async(format!("ws://{addr}/api/ws")).await.unwrap();
        let welcome = recv(&mut client).await;
        assert_eq!(welcome.syscall, "session:connected");
        client
    }

    async fn recv(client: &mut Client) -> Frame {
        loop {
            let msg = timeout(Duration::from_secs(2), client.next())
                .await
                .expect("socket receive timed out")
                .expect("socket closed")
                .expect("socket error");
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn send(client: &mut Client, syscall: &str, data: serde_json::Value) -> Frame {
        let (req, text) = request(syscall, data);
        client.send(WsMessage::text(text)).await.unwrap();
        let reply = recv(client).await;
        assert_eq!(reply.parent_id, Some(req.id));
        reply
    }

    #[tokio::test]
    async fn presence_entry_vanishes_when_socket_closes() {
        let addr = serve().await;
        let mut alice = connect(addr).await;
        let mut bob = connect(addr).await;

        send(&mut bob, "store:write", json!({"path": "rooms/r1/users/bob", "value": {"id": "bob", "name": "User-bob0"}})).await;
        send(&mut bob, "store:on_disconnect", json!({"path": "rooms/r1/users/bob"})).await;

        let sub = send(&mut alice, "store:subscribe", json!({"path": "rooms/r1/users"})).await;
        assert_eq!(sub.status, Status::Done);
        let initial = recv(&mut alice).await;
        assert_eq!(initial.data.get("value"), Some(&json!({"bob": {"id": "bob", "name": "User-bob0"}})));

        bob.close(None).await.unwrap();
        let gone = recv(&mut alice).await;
        assert_eq!(gone.syscall, "store:event");
        assert_eq!(gone.data.get("value"), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn http_routes_see_socket_writes() {
        let addr = serve().await;
        let mut alice = connect(addr).await;

        send(&mut alice, "store:write", json!({"path": "rooms/xyz789/settings", "value": {"password": "pw", "isPublic": false}})).await;

        let http = reqwest::Client::new();
        let health = http.get(format!("http://{addr}/healthz")).send().await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        let info: serde_json::Value = http
            .get(format!("http://{addr}/api/rooms/xyz789"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(info["exists"], json!(true));
        assert_eq!(info["isPublic"], json!(false));

        let auth: serde_json::Value = http
            .post(format!("http://{addr}/api/rooms/xyz789/auth"))
            .json(&json!({"password": "pw"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(auth, json!({"authorized": true}));
    }
}
