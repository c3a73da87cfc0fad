//! Keyed Store
//!
//! Named, typed, persistent value cells shared by every execution context.
//! A cell is declared per context (key + default); all declarations of a key
//! address the same stored value. Writes are last-write-wins with no merge
//! and no compare-and-swap: callers that need read-modify-write atomicity
//! must funnel writes for that key through a single context.
//!
//! Change notifications travel through the storage area, not the control
//! channel. Each subscriber receives one notification per `set`, in commit
//! order for that key, even when the value is unchanged.

pub mod area;
pub mod memory;
pub mod persistence;
pub mod settings;

pub use area::{Change, ChangeHub, ContextId, StorageArea};
pub use memory::MemoryArea;
pub use persistence::SledArea;

use crate::error::{to_storage_data, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Values a [`KeyedStore`] can hold
pub trait StoreValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// One execution context's handle on a storage area
#[derive(Clone)]
pub struct StoreContext {
    area: Arc<dyn StorageArea>,
    id: ContextId,
    label: Arc<str>,
}

impl StoreContext {
    pub fn open(area: Arc<dyn StorageArea>, label: &str) -> Self {
        static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            area,
            id: ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)),
            label: Arc::from(label),
        }
    }

    pub fn area(&self) -> &Arc<dyn StorageArea> {
        &self.area
    }

    /// Declare a cell whose changes are only observed inside this context
    pub fn cell<T: StoreValue>(&self, key: &str, default: T) -> KeyedStore<T> {
        KeyedStore::declare(self.clone(), key, default, false)
    }

    /// Declare a cell whose changes are broadcast to every context
    pub fn live_cell<T: StoreValue>(&self, key: &str, default: T) -> KeyedStore<T> {
        KeyedStore::declare(self.clone(), key, default, true)
    }
}

/// A named, typed, persistent value cell
pub struct KeyedStore<T> {
    key: String,
    default: T,
    live_update: bool,
    context: StoreContext,
}

impl<T: StoreValue> KeyedStore<T> {
    fn declare(context: StoreContext, key: &str, default: T, live_update: bool) -> Self {
        Self {
            key: key.to_string(),
            default,
            live_update,
            context,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn live_update(&self) -> bool {
        self.live_update
    }

    /// Current value, or the default if never set.
    ///
    /// Never fails: a read or decode failure is logged and the default returned.
    /// Use [`KeyedStore::try_get`] to observe storage failures.
    pub async fn get(&self) -> T {
        match self.try_get().await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Falling back to default value");
                self.default.clone()
            }
        }
    }

    pub async fn try_get(&self) -> Result<T, StorageError> {
        match self.context.area.read(&self.key).await? {
            Some(raw) => serde_json::from_value(raw).map_err(|e| to_storage_data(&self.key, e)),
            None => Ok(self.default.clone()),
        }
    }

    /// Persist `value`, overwriting any prior value, then notify subscribers.
    pub async fn set(&self, value: T) -> Result<(), StorageError> {
        let raw = serde_json::to_value(&value).map_err(|e| to_storage_data(&self.key, e))?;
        debug!(
            key = %self.key,
            context = %self.context.label,
            live = self.live_update,
            "Writing keyed value"
        );
        self.context
            .area
            .write(Change {
                key: self.key.clone(),
                value: raw,
                origin: self.context.id,
                live: self.live_update,
            })
            .await
    }

    /// Explicitly restore the declared default
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.set(self.default.clone()).await
    }

    /// Invoke `handler` for every change of this key, from any context
    /// (for live cells) or from this context (otherwise).
    ///
    /// Must be called within a tokio runtime. Delivery stops when the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let area = Arc::clone(&self.context.area);
        let (id, mut rx) = area.changes().register(&self.key, self.context.id);
        let key = self.key.clone();

        let task_key = key.clone();
        let task = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                match serde_json::from_value::<T>(raw) {
                    Ok(value) => handler(value),
                    Err(e) => {
                        warn!(key = %task_key, error = %e, "Ignoring undecodable change")
                    }
                }
            }
        });

        Subscription {
            area,
            key,
            id,
            task: Some(task),
        }
    }
}

impl<T: Clone> Clone for KeyedStore<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            default: self.default.clone(),
            live_update: self.live_update,
            context: self.context.clone(),
        }
    }
}

/// Scoped registration of a change handler
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    area: Arc<dyn StorageArea>,
    key: String,
    id: u64,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stop receiving events; equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.area.changes().unregister(&self.key, self.id);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
