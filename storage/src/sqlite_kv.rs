//! # SQLite backing store
//!
//! Durable [`KvStore`] on a single table:
//!
//! ```sql
//! CREATE TABLE kv_store (
//!     key TEXT PRIMARY KEY,
//!     value BLOB NOT NULL
//! );
//! ```

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::kv::KvStore;
use crate::sqlite_pool::SqlitePoolManager;

#[derive(Clone)]
pub struct SqliteKvStore {
    pool_manager: SqlitePoolManager,
}

impl SqliteKvStore {
    /// Opens (or creates) the database and ensures the table exists.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating kv_store table if not exist");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )
            "#,
        )
        .execute(self.pool_manager.pool())
        .await?;
        Ok(())
    }

    /// Closes the underlying pool. Later operations report [`StorageError::Unavailable`].
    pub async fn close(&self) {
        self.pool_manager.close().await;
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool_manager.pool())
            .await?;
        debug!(key, found = row.is_some(), "SQLite kv get");
        Ok(row.map(|r| r.0))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(self.pool_manager.pool())
        .await?;
        debug!(key, bytes = value.len(), "SQLite kv set");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM kv_store")
            .execute(self.pool_manager.pool())
            .await?;
        info!(removed = result.rows_affected(), "SQLite kv cleared");
        Ok(())
    }
}
