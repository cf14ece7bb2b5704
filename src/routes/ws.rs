//! WebSocket handler — remote access to the shared state tree.
//!
//! DESIGN
//! ======
//! Each socket owns one store connection. On upgrade the gateway enters a
//! `select!` loop:
//! - Incoming client frames → parse + dispatch on the `store:` prefix
//! - Subscription events from forwarding tasks → `store:event` frames
//!
//! Handler functions validate the frame, call the store and return the
//! reply payload or an error frame. Only the loop writes to the socket, so
//! a request's `done` always precedes the events its subscription produces.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with the connection id
//! 2. Client sends `store:*` requests → done / error replies
//! 3. Each subscription gets a forwarding task feeding the event channel
//! 4. Close → abort forwarding tasks → disconnect, firing on-disconnect removals

use std::collections::HashMap;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::state::AppState;
use crate::store::{SharedState, StatePath, StoreConnection, StoreEvent, Subscription, WatchMode};

// =============================================================================
// GATEWAY
// =============================================================================

/// Per-socket state: the store connection and its live subscriptions.
struct Gateway {
    conn: StoreConnection,
    subscriptions: HashMap<String, JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<Frame>,
}

impl Gateway {
    fn new(conn: StoreConnection, events_tx: mpsc::UnboundedSender<Frame>) -> Self {
        Self { conn, subscriptions: HashMap::new(), events_tx }
    }

    /// Stop forwarding and close the store connection.
    fn close(mut self) {
        for (_, task) in self.subscriptions.drain() {
            task.abort();
        }
        self.conn.disconnect();
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Frame>();
    let mut gateway = Gateway::new(state.store.connect(), events_tx);
    let connection = gateway.conn.id();

    let welcome = Frame::request("session:connected", Data::new()).with_data("connection", connection);
    if send_frame(&mut socket, &welcome).await.is_err() {
        gateway.close();
        return;
    }

    info!(connection, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&mut gateway, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = events_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    gateway.close();
    info!(connection, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(gateway: &mut Gateway, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(connection = gateway.conn.id(), error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    if req.status != Status::Request {
        return vec![req.error("only request frames are accepted")];
    }

    debug!(connection = gateway.conn.id(), id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "store" => handle_store(gateway, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(data) if data.is_empty() => vec![req.done()],
        Ok(data) => vec![req.done_with(data)],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// STORE HANDLERS
// =============================================================================

async fn handle_store(gateway: &mut Gateway, req: &Frame) -> Result<Data, Frame> {
    match req.op() {
        "read" => {
            let path = path_field(req)?;
            let value = gateway
                .conn
                .read(&path)
                .await
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            data.insert("value".into(), value.unwrap_or(Value::Null));
            Ok(data)
        }
        "write" => {
            let path = path_field(req)?;
            let value = value_field(req)?;
            gateway
                .conn
                .write(&path, value)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Data::new())
        }
        "push" => {
            let path = path_field(req)?;
            let value = value_field(req)?;
            let key = gateway
                .conn
                .push(&path, value)
                .await
                .map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            data.insert("key".into(), Value::String(key));
            Ok(data)
        }
        "remove" => {
            let path = path_field(req)?;
            gateway
                .conn
                .remove(&path)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Data::new())
        }
        "subscribe" => {
            let path = path_field(req)?;
            let mode = match req.str_field("mode") {
                None => WatchMode::Value,
                Some(raw) => WatchMode::parse(raw).ok_or_else(|| req.error(format!("unknown mode: {raw}")))?,
            };
            let subscription = gateway
                .conn
                .subscribe(&path, mode)
                .await
                .map_err(|e| req.error_from(&e))?;
            let id = Uuid::new_v4().to_string();
            let task = tokio::spawn(forward_events(id.clone(), subscription, gateway.events_tx.clone()));
            gateway.subscriptions.insert(id.clone(), task);
            info!(connection = gateway.conn.id(), %path, mode = mode.as_str(), subscription = %id, "ws: subscribed");
            let mut data = Data::new();
            data.insert("subscription".into(), Value::String(id));
            Ok(data)
        }
        "unsubscribe" => {
            let Some(id) = req.str_field("subscription") else {
                return Err(req.error("subscription required"));
            };
            let Some(task) = gateway.subscriptions.remove(id) else {
                return Err(req.error(format!("unknown subscription: {id}")));
            };
            task.abort();
            Ok(Data::new())
        }
        "on_disconnect" => {
            let path = path_field(req)?;
            gateway
                .conn
                .remove_on_disconnect(&path)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Data::new())
        }
        op => Err(req.error(format!("unknown store op: {op}"))),
    }
}

fn path_field(req: &Frame) -> Result<StatePath, Frame> {
    let Some(raw) = req.str_field("path") else {
        return Err(req.error("path required"));
    };
    StatePath::parse(raw).map_err(|e| req.error_from(&e))
}

fn value_field(req: &Frame) -> Result<Value, Frame> {
    req.data
        .get("value")
        .cloned()
        .ok_or_else(|| req.error("value required"))
}

/// Relay one subscription's events until either side goes away.
async fn forward_events(id: String, mut subscription: Subscription, tx: mpsc::UnboundedSender<Frame>) {
    while let Some(event) = subscription.next().await {
        if tx.send(event_frame(&id, event)).is_err() {
            break;
        }
    }
}

fn event_frame(subscription: &str, event: StoreEvent) -> Frame {
    let mut data = Data::new();
    data.insert("subscription".into(), Value::String(subscription.to_owned()));
    match event {
        StoreEvent::Value(value) => {
            data.insert("kind".into(), Value::String(WatchMode::Value.as_str().into()));
            data.insert("value".into(), value.unwrap_or(Value::Null));
        }
        StoreEvent::ChildAdded { key, value } => {
            data.insert("kind".into(), Value::String(WatchMode::ChildAdded.as_str().into()));
            data.insert("key".into(), Value::String(key));
            data.insert("value".into(), value);
        }
    }
    Frame::request("store:event", data)
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
