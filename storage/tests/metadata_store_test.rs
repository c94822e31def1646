//! Integration tests for [`storage::MetadataStore`].
//!
//! Covers the precedence scenarios (composite model is terminal, timestamp provenance), the
//! default conversation key, rejected writes, and degraded behavior on an unavailable backend.

use std::sync::Arc;

use lens_core::{
    GenerationSettings, MetadataPatch, Role, TimestampSource, DEFAULT_CONVERSATION,
};
use storage::{InMemoryKvStore, MetadataStore, SqliteKvStore, UpsertOutcome, METADATA_KEY};

fn settings() -> GenerationSettings {
    GenerationSettings {
        max_tokens: Some(300),
        temperature: Some(0.8),
        top_p: Some(0.95),
        top_k: Some(40),
    }
}

fn memory_store() -> (MetadataStore, InMemoryKvStore) {
    let backend = InMemoryKvStore::new();
    (MetadataStore::new(Arc::new(backend.clone())), backend)
}

/// **Test: composite model survives a later list-style overwrite.**
///
/// **Setup:** plain model upsert, then composite upsert for the same key.
/// **Action:** a third upsert with only the actual model and a later timestamp.
/// **Expected:** model stays composite; timestamp stays 1000; settings untouched.
#[tokio::test]
async fn test_composite_model_is_terminal() {
    let (store, _) = memory_store();

    let first = MetadataPatch::role(Role::Bot)
        .with_model("llama-70b")
        .with_settings(settings())
        .with_timestamp(1000, TimestampSource::Listed);
    store.upsert(Some("c1"), Some("conv1"), "m1", first).await;

    let second = MetadataPatch::role(Role::Bot)
        .with_model("llama-70b → llama-70b-v2")
        .with_settings(settings())
        .with_timestamp(1000, TimestampSource::Listed);
    let outcome = store.upsert(Some("c1"), Some("conv1"), "m1", second).await;
    assert_eq!(outcome, UpsertOutcome::Updated);

    let record = store.get("c1", Some("conv1"), "m1").await.unwrap();
    assert_eq!(record.model.as_deref(), Some("llama-70b → llama-70b-v2"));

    let third = MetadataPatch::role(Role::Bot)
        .with_model("llama-70b-v2")
        .with_timestamp(2000, TimestampSource::Listed);
    store.upsert(Some("c1"), Some("conv1"), "m1", third).await;

    let record = store.get("c1", Some("conv1"), "m1").await.unwrap();
    assert_eq!(record.model.as_deref(), Some("llama-70b → llama-70b-v2"));
    assert_eq!(record.timestamp, Some(1000));
    assert_eq!(record.settings(), settings());
}

/// **Test: missing conversation id uses the default key.**
///
/// **Action:** `upsert("c1", None, "m1", {role: user, timestamp: 500})`.
/// **Expected:** readable with `None` and with the default key.
#[tokio::test]
async fn test_missing_conversation_uses_default_key() {
    let (store, _) = memory_store();

    let patch = MetadataPatch::role(Role::User).with_timestamp(500, TimestampSource::Sent);
    let outcome = store.upsert(Some("c1"), None, "m1", patch).await;
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let by_none = store.get("c1", None, "m1").await.unwrap();
    let by_key = store.get("c1", Some(DEFAULT_CONVERSATION), "m1").await.unwrap();
    assert_eq!(by_none, by_key);
    assert_eq!(by_none.role, Some(Role::User));
    assert_eq!(by_none.timestamp, Some(500));
}

/// **Test: a write without character id is dropped.**
///
/// **Expected:** outcome Rejected; nothing persisted; `get("", ...)` is None.
#[tokio::test]
async fn test_missing_character_is_rejected() {
    let (store, backend) = memory_store();

    let outcome = store
        .upsert(None, Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    assert_eq!(outcome, UpsertOutcome::Rejected);
    assert!(store.get("", Some("conv1"), "m1").await.is_none());
    assert!(backend.is_empty().await);

    let outcome = store
        .upsert(Some("  "), Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    assert_eq!(outcome, UpsertOutcome::Rejected);
}

#[tokio::test]
async fn test_get_never_written_is_none() {
    let (store, _) = memory_store();
    assert!(store.get("c1", Some("conv1"), "m1").await.is_none());

    store
        .upsert(Some("c1"), Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    assert!(store.get("c1", Some("conv1"), "m2").await.is_none());
    assert!(store.get("c1", Some("conv2"), "m1").await.is_none());
    assert!(store.get("c2", Some("conv1"), "m1").await.is_none());
}

#[tokio::test]
async fn test_identical_upsert_is_idempotent() {
    let (store, _) = memory_store();
    let patch = MetadataPatch::role(Role::Bot)
        .with_model("llama-70b")
        .with_settings(settings())
        .with_timestamp(1000, TimestampSource::Sent);

    store.upsert(Some("c1"), Some("conv1"), "m1", patch.clone()).await;
    let once = store.get("c1", Some("conv1"), "m1").await.unwrap();

    let outcome = store.upsert(Some("c1"), Some("conv1"), "m1", patch).await;
    assert_eq!(outcome, UpsertOutcome::Unchanged);
    assert_eq!(store.get("c1", Some("conv1"), "m1").await.unwrap(), once);
}

#[tokio::test]
async fn test_clear_wipes_everything() {
    let (store, _) = memory_store();
    store
        .upsert(Some("c1"), Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    store
        .upsert(Some("c2"), None, "m2", MetadataPatch::role(Role::User))
        .await;

    store.clear().await;
    assert!(store.get("c1", Some("conv1"), "m1").await.is_none());
    assert!(store.try_characters().await.unwrap().is_empty());
}

/// **Test: an invalidated backend degrades instead of failing.**
///
/// **Expected:** upsert reports Failed, get returns None, clear is a no-op.
#[tokio::test]
async fn test_unavailable_backend_degrades() {
    let (store, backend) = memory_store();
    store
        .upsert(Some("c1"), Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    backend.invalidate();

    let outcome = store
        .upsert(Some("c1"), Some("conv1"), "m2", MetadataPatch::role(Role::Bot))
        .await;
    assert_eq!(outcome, UpsertOutcome::Failed);
    assert!(store.get("c1", Some("conv1"), "m1").await.is_none());
    store.clear().await;
    assert!(store.try_get("c1", Some("conv1"), "m1").await.is_err());
}

#[tokio::test]
async fn test_corrupt_blob_reads_as_missing() {
    let backend = InMemoryKvStore::new();
    storage::KvStore::set(&backend, METADATA_KEY, b"{not json".to_vec())
        .await
        .unwrap();
    let store = MetadataStore::new(Arc::new(backend));

    assert!(store.get("c1", None, "m1").await.is_none());
    let outcome = store
        .upsert(Some("c1"), None, "m1", MetadataPatch::role(Role::Bot))
        .await;
    assert_eq!(outcome, UpsertOutcome::Failed);
}

#[tokio::test]
async fn test_conversation_and_characters_listing() {
    let (store, _) = memory_store();
    store
        .upsert(Some("c1"), Some("conv1"), "m1", MetadataPatch::role(Role::Bot))
        .await;
    store
        .upsert(Some("c1"), Some("conv1"), "m2", MetadataPatch::role(Role::User))
        .await;
    store
        .upsert(Some("c1"), Some("conv2"), "m3", MetadataPatch::role(Role::Bot))
        .await;

    let records = store.try_conversation("c1", Some("conv1")).await.unwrap();
    assert_eq!(records.keys().cloned().collect::<Vec<_>>(), vec!["m1", "m2"]);

    let characters = store.try_characters().await.unwrap();
    assert_eq!(
        characters,
        vec![("c1".to_string(), vec!["conv1".to_string(), "conv2".to_string()])]
    );
}

/// **Test: records persist through the SQLite backend across store instances.**
#[tokio::test]
async fn test_sqlite_backend_is_source_of_truth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lens.db");
    let url = path.to_str().unwrap();

    let backend = Arc::new(SqliteKvStore::new(url).await.expect("Failed to open store"));
    let store = MetadataStore::new(backend.clone());
    store
        .upsert(
            Some("c1"),
            Some("conv1"),
            "m1",
            MetadataPatch::role(Role::Bot).with_model("llama-70b → llama-70b-v2"),
        )
        .await;

    let other = MetadataStore::new(backend);
    let record = other.get("c1", Some("conv1"), "m1").await.unwrap();
    assert!(record.has_composite_model());
}
