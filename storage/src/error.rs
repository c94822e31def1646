//! Storage error types.
//!
//! Used by backing store implementations and the metadata / profile stores.

use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The backing store can no longer be reached (e.g. its owning context was torn down).
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                StorageError::Unavailable(e.to_string())
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for lens_core::LensError {
    fn from(e: StorageError) -> Self {
        lens_core::LensError::Storage(e.to_string())
    }
}
