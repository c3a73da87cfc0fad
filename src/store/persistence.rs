//! Persistence layer for the keyed store

use crate::error::{to_storage_data, to_storage_io, StorageError};
use crate::store::area::{Change, ChangeHub, StorageArea};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::Mutex;
use tokio::task;

const TREE_VALUES: &str = "keyed_values";

/// Sled-based implementation of [`StorageArea`]
///
/// Sled calls run on the blocking pool. Commits hold an async lock across
/// the flush so change notifications are published in commit order.
pub struct SledArea {
    values: sled::Tree,
    changes: ChangeHub,
    commit: Mutex<()>,
}

impl SledArea {
    /// Open (or create) the sled database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(to_storage_io)?;
        let values = db.open_tree(TREE_VALUES).map_err(to_storage_io)?;
        Ok(Self {
            values,
            changes: ChangeHub::new(),
            commit: Mutex::new(()),
        })
    }
}

fn read_blocking(values: &sled::Tree, key: &str) -> Result<Option<Value>, StorageError> {
    let Some(raw) = values.get(key.as_bytes()).map_err(to_storage_io)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&raw).map_err(|e| to_storage_data(key, e))?;
    Ok(Some(value))
}

fn commit_blocking(values: &sled::Tree, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
    values.insert(key.as_bytes(), bytes).map_err(to_storage_io)?;
    values.flush().map_err(to_storage_io)?;
    Ok(())
}

fn join_failed(err: task::JoinError) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("storage task failed: {}", err),
    ))
}

#[async_trait]
impl StorageArea for SledArea {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.clone();
        let key = key.to_string();
        task::spawn_blocking(move || read_blocking(&values, &key))
            .await
            .map_err(join_failed)?
    }

    async fn write(&self, change: Change) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(&change.value).map_err(|e| to_storage_data(&change.key, e))?;

        let _commit = self.commit.lock().await;
        let values = self.values.clone();
        let key = change.key.clone();
        task::spawn_blocking(move || commit_blocking(&values, &key, bytes))
            .await
            .map_err(join_failed)??;
        self.changes.publish(&change);
        Ok(())
    }

    fn changes(&self) -> &ChangeHub {
        &self.changes
    }
}
