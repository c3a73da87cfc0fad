//! In-memory storage area; same semantics as the sled area without durability.

use crate::error::StorageError;
use crate::store::area::{Change, ChangeHub, StorageArea};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryArea {
    values: Mutex<HashMap<String, Value>>,
    changes: ChangeHub,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn write(&self, change: Change) -> Result<(), StorageError> {
        // The values lock doubles as the commit lock.
        let mut values = self.values.lock();
        values.insert(change.key.clone(), change.value.clone());
        self.changes.publish(&change);
        Ok(())
    }

    fn changes(&self) -> &ChangeHub {
        &self.changes
    }
}
