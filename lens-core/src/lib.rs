//! # lens-core
//!
//! Core types and traits for chat message metadata reconciliation: [`MetadataRecord`] and
//! [`MetadataPatch`], the [`MetadataEvent`]s the interceptor emits, the [`EventHandler`] trait,
//! error types and tracing initialization. Host-agnostic; used by every other crate.

pub mod error;
pub mod event;
pub mod logger;
pub mod types;

pub use error::{LensError, ObservationError, Result};
pub use event::{EventHandler, HandlerResponse, LoadedMessage, MetadataEvent};
pub use logger::init_tracing;
pub use types::{
    compose_model, conversation_key, is_composite_model, GenerationSettings, MetadataPatch,
    MetadataRecord, Profile, Role, TimestampSource, DEFAULT_CONVERSATION, MODEL_SEPARATOR,
};
