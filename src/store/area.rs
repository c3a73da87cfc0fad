//! Storage areas: durable key → JSON value persistence plus change fan-out.

use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Identity of one execution context (controller, or one surface)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// One committed write, as seen by watchers
#[derive(Debug, Clone)]
pub struct Change {
    pub key: String,
    pub value: Value,
    pub origin: ContextId,
    /// Live changes reach every context; others only the writer's own.
    pub live: bool,
}

struct Watcher {
    id: u64,
    context: ContextId,
    tx: UnboundedSender<Value>,
}

/// Fan-out of committed changes to registered watchers, per key
pub struct ChangeHub {
    next_id: AtomicU64,
    watchers: Mutex<HashMap<String, Vec<Watcher>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, key: &str, context: ContextId) -> (u64, UnboundedReceiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();
        self.watchers
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(Watcher { id, context, tx });
        (id, rx)
    }

    pub fn unregister(&self, key: &str, id: u64) -> bool {
        let mut watchers = self.watchers.lock();
        let Some(list) = watchers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|w| w.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            watchers.remove(key);
        }
        removed
    }

    /// Deliver `change` to matching watchers. Callers publish while holding
    /// their commit lock so per-key delivery follows commit order.
    pub fn publish(&self, change: &Change) {
        let mut watchers = self.watchers.lock();
        if let Some(list) = watchers.get_mut(&change.key) {
            list.retain(|w| {
                if !change.live && w.context != change.origin {
                    return true;
                }
                // A closed receiver means the subscription task is gone.
                w.tx.send(change.value.clone()).is_ok()
            });
        }
    }

    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.lock().get(key).map_or(0, Vec::len)
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable storage backend with change subscription
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Stored value, or `None` if the key was never written
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Commit `change.value` under `change.key` (last write wins), then
    /// publish it through [`StorageArea::changes`].
    async fn write(&self, change: Change) -> Result<(), StorageError>;

    fn changes(&self) -> &ChangeHub;
}
