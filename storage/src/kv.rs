//! # Backing store
//!
//! Flat, string-keyed, durable byte store. Implemented by [`crate::InMemoryKvStore`] and
//! [`crate::SqliteKvStore`]; the metadata and profile stores serialize their whole state as one
//! JSON blob under a single key.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Asynchronous key-value byte store. Each operation is atomic for its single key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Reads and decodes the JSON value under `key`, or `T::default()` when absent.
pub async fn get_json<T>(store: &dyn KvStore, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(T::default()),
    }
}

/// Encodes `value` as JSON and stores it under `key`.
pub async fn set_json<T>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + Sync,
{
    let bytes = serde_json::to_vec(value)?;
    store.set(key, bytes).await
}
