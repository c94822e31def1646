//! # In-memory backing store
//!
//! [`KvStore`] over a `HashMap`, for tests and for sessions that do not need durability.
//! Data is lost when the store is dropped.
//!
//! [`InMemoryKvStore::invalidate`] simulates a torn-down owning context: every later call
//! fails with [`StorageError::Unavailable`].
//!
//! ## Thread Safety
//!
//! The map sits behind `Arc<RwLock<>>`; clones share the same data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageError;
use crate::kv::KvStore;

#[derive(Debug, Clone)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryKvStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the number of keys in the store.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Makes every later operation fail with [`StorageError::Unavailable`].
    pub fn invalidate(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "in-memory store was invalidated".to_string(),
            ))
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.ensure_available()?;
        let entries = self.entries.read().await;
        let value = entries.get(key).cloned();
        debug!(key, found = value.is_some(), "In-memory kv get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.ensure_available()?;
        debug!(key, bytes = value.len(), "In-memory kv set");
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.entries.write().await.clear();
        Ok(())
    }
}
