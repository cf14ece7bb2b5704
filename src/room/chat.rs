//! Chat stream — append-only room messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::RoomError;
use super::paths::RoomPaths;
use crate::store::{SharedState, StoreEvent, Subscription, WatchMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_name: String,
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody {
    #[serde(default)]
    user_name: String,
    text: String,
}

pub struct ChatStream {
    store: Arc<dyn SharedState>,
    paths: RoomPaths,
    user_name: String,
    subscription: Option<Subscription>,
}

impl ChatStream {
    #[must_use]
    pub fn new(store: Arc<dyn SharedState>, paths: RoomPaths, user_name: &str) -> Self {
        Self { store, paths, user_name: user_name.to_owned(), subscription: None }
    }

    /// Start receiving messages, beginning with the ones already stored.
    ///
    /// # Errors
    ///
    /// Returns a store error if the subscription cannot be opened.
    pub async fn open(&mut self) -> Result<(), RoomError> {
        let subscription = self.store.subscribe(&self.paths.chat(), WatchMode::ChildAdded).await?;
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Post a message. Blank text is dropped; otherwise the text is trimmed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the message cannot be pushed.
    pub async fn send(&self, text: &str) -> Result<Option<String>, RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let id = self
            .store
            .push(&self.paths.chat(), json!({"text": text, "userName": self.user_name}))
            .await?;
        debug!(room_id = %self.paths.room_id(), message_id = %id, "chat: sent");
        Ok(Some(id))
    }

    /// Next message in delivery order, each exactly once. `None` when not
    /// open or the connection is gone.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        let subscription = self.subscription.as_mut()?;
        loop {
            let StoreEvent::ChildAdded { key, value } = subscription.next().await? else {
                continue;
            };
            match serde_json::from_value::<MessageBody>(value) {
                Ok(body) => return Some(ChatMessage { id: key, user_name: body.user_name, text: body.text }),
                Err(e) => warn!(%key, error = %e, "chat: skipping malformed message"),
            }
        }
    }
}
