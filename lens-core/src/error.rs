//! Error types for the reconciliation core.
//!
//! [`LensError`] is the top-level error; [`ObservationError`] covers intercepted payloads that
//! could not be understood.

use thiserror::Error;

/// Top-level error (storage backend, observation, config, IO).
#[derive(Error, Debug)]
pub enum LensError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Observation error: {0}")]
    Observation(#[from] ObservationError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// An intercepted exchange had a body that could not be parsed into events.
#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected shape: {0}")]
    UnexpectedShape(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Result type for core operations; uses [`LensError`].
pub type Result<T> = std::result::Result<T, LensError>;
