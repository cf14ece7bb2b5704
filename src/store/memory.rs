//! In-process shared state tree.
//!
//! DESIGN
//! ======
//! One mutex guards the tree, the watcher list and the on-disconnect
//! registry. Every mutation runs to completion under the lock, including
//! fan-out to watchers, which is what gives per-path write ordering.
//! Watchers are unbounded channels; a watcher whose receiver is gone is
//! dropped on the next delivery attempt.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::push_id::PushIdGenerator;
use super::{SharedState, StatePath, StoreError, StoreEvent, Subscription, WatchMode, tree};
use crate::frame::now_ms;

// =============================================================================
// STORE
// =============================================================================

struct Watcher {
    connection: u64,
    path: StatePath,
    mode: WatchMode,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

enum Before {
    Untouched,
    Value(Option<Value>),
    Keys(BTreeSet<String>),
}

struct StoreInner {
    root: Value,
    watchers: Vec<Watcher>,
    next_connection: u64,
    on_disconnect: HashMap<u64, Vec<StatePath>>,
}

impl StoreInner {
    fn apply(&mut self, path: &StatePath, value: Value) {
        let before: Vec<Before> = self
            .watchers
            .iter()
            .map(|w| {
                if !w.path.overlaps(path) {
                    return Before::Untouched;
                }
                match w.mode {
                    WatchMode::Value => Before::Value(tree::get(&self.root, w.path.segments()).cloned()),
                    WatchMode::ChildAdded => {
                        Before::Keys(tree::child_keys(&self.root, w.path.segments()).into_iter().collect())
                    }
                }
            })
            .collect();

        tree::set(&mut self.root, path.segments(), value);

        let root = &self.root;
        let mut before = before.into_iter();
        self.watchers.retain(|w| match before.next() {
            Some(Before::Value(old)) => {
                let new = tree::get(root, w.path.segments()).cloned();
                if new == old {
                    return !w.tx.is_closed();
                }
                w.tx.send(StoreEvent::Value(new)).is_ok()
            }
            Some(Before::Keys(old_keys)) => {
                for key in tree::child_keys(root, w.path.segments()) {
                    if old_keys.contains(&key) {
                        continue;
                    }
                    let value = child_value(root, &w.path, &key);
                    if w.tx.send(StoreEvent::ChildAdded { key, value }).is_err() {
                        return false;
                    }
                }
                true
            }
            Some(Before::Untouched) | None => !w.tx.is_closed(),
        });
    }
}

fn child_value(root: &Value, parent: &StatePath, key: &str) -> Value {
    let mut segments = parent.segments().to_vec();
    segments.push(key.to_owned());
    tree::get(root, &segments).cloned().unwrap_or(Value::Null)
}

/// The in-process store. Cheap to clone; all clones share one tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    ids: Arc<PushIdGenerator>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                root: Value::Object(Map::new()),
                watchers: Vec::new(),
                next_connection: 0,
                on_disconnect: HashMap::new(),
            })),
            ids: Arc::new(PushIdGenerator::new()),
        }
    }

    /// Open a new participant connection.
    #[must_use]
    pub fn connect(&self) -> StoreConnection {
        let id = {
            let mut inner = self.lock();
            inner.next_connection += 1;
            inner.next_connection
        };
        debug!(connection = id, "store: connection opened");
        StoreConnection { id, store: self.clone(), closed: AtomicBool::new(false) }
    }

    /// Number of live subscriptions across all connections.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|w| !w.tx.is_closed());
        inner.watchers.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// One participant's handle on a [`MemoryStore`].
///
/// Closing it (explicitly or by dropping it) runs its registered
/// on-disconnect removals and ends its subscriptions.
pub struct StoreConnection {
    id: u64,
    store: MemoryStore,
    closed: AtomicBool,
}

impl StoreConnection {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Simulate transport loss: fire on-disconnect removals, end subscriptions.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.store.lock();
        let removals = inner.on_disconnect.remove(&self.id).unwrap_or_default();
        for path in &removals {
            inner.apply(path, Value::Null);
        }
        let id = self.id;
        inner.watchers.retain(|w| w.connection != id);
        debug!(connection = id, removals = removals.len(), "store: connection closed");
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_connected() { Ok(()) } else { Err(StoreError::Disconnected) }
    }
}

impl Drop for StoreConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait]
impl SharedState for StoreConnection {
    async fn read(&self, path: &StatePath) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let inner = self.store.lock();
        Ok(tree::get(&inner.root, path.segments()).cloned())
    }

    async fn write(&self, path: &StatePath, value: Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.store.lock().apply(path, value);
        Ok(())
    }

    async fn push(&self, path: &StatePath, value: Value) -> Result<String, StoreError> {
        self.ensure_open()?;
        let key = self.store.ids.next_at(now_ms());
        let child = path.child(&key)?;
        self.store.lock().apply(&child, value);
        Ok(key)
    }

    async fn subscribe(&self, path: &StatePath, mode: WatchMode) -> Result<Subscription, StoreError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.store.lock();

        // Initial delivery happens under the lock so no write can slip between
        // the snapshot and registration.
        match mode {
            WatchMode::Value => {
                let current = tree::get(&inner.root, path.segments()).cloned();
                let _ = tx.send(StoreEvent::Value(current));
            }
            WatchMode::ChildAdded => {
                for key in tree::child_keys(&inner.root, path.segments()) {
                    let value = child_value(&inner.root, path, &key);
                    let _ = tx.send(StoreEvent::ChildAdded { key, value });
                }
            }
        }

        inner.watchers.push(Watcher { connection: self.id, path: path.clone(), mode, tx });
        Ok(Subscription::new(path.clone(), mode, rx))
    }

    async fn remove_on_disconnect(&self, path: &StatePath) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.store
            .lock()
            .on_disconnect
            .entry(self.id)
            .or_default()
            .push(path.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
