//! Storage crate: backing key-value stores and the metadata / profile stores built on them.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`kv`] – KvStore trait and JSON helpers
//! - [`inmemory`] – InMemoryKvStore
//! - [`sqlite_kv`] – SqliteKvStore, on [`sqlite_pool`]'s SqlitePoolManager
//! - [`merge`] – merge rules and UpsertOutcome
//! - [`metadata_store`] – MetadataStore (character → conversation → message)
//! - [`profile_store`] – ProfileStore

pub mod error;
pub mod inmemory;
pub mod kv;
pub mod merge;
pub mod metadata_store;
pub mod profile_store;
pub mod sqlite_kv;
pub mod sqlite_pool;

#[cfg(test)]
mod sqlite_kv_test;

pub use error::StorageError;
pub use inmemory::InMemoryKvStore;
pub use kv::{get_json, set_json, KvStore};
pub use merge::{merge, UpsertOutcome};
pub use metadata_store::{MetadataStore, METADATA_KEY};
pub use profile_store::{ProfileStore, PROFILES_KEY};
pub use sqlite_kv::SqliteKvStore;
pub use sqlite_pool::SqlitePoolManager;
