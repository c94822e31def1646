//! Unit tests for SqliteKvStore.
//!
//! In-memory SQLite for the basic contract; a temp file for durability across reopen.

use crate::error::StorageError;
use crate::kv::KvStore;
use crate::sqlite_kv::SqliteKvStore;

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let store = SqliteKvStore::new("sqlite::memory:")
        .await
        .expect("Failed to create store");

    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_overwrites_existing_value() {
    let store = SqliteKvStore::new("sqlite::memory:")
        .await
        .expect("Failed to create store");

    store.set("k", b"first".to_vec()).await.unwrap();
    store.set("k", b"second".to_vec()).await.unwrap();

    assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
}

#[tokio::test]
async fn test_remove_and_clear() {
    let store = SqliteKvStore::new("sqlite::memory:")
        .await
        .expect("Failed to create store");

    store.set("a", b"1".to_vec()).await.unwrap();
    store.set("b", b"2".to_vec()).await.unwrap();
    store.remove("a").await.unwrap();
    assert!(store.get("a").await.unwrap().is_none());
    assert!(store.get("b").await.unwrap().is_some());

    store.clear().await.unwrap();
    assert!(store.get("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lens.db");
    let url = path.to_str().unwrap();

    {
        let store = SqliteKvStore::new(url).await.expect("Failed to create store");
        store.set("k", b"durable".to_vec()).await.unwrap();
        store.close().await;
    }

    let reopened = SqliteKvStore::new(url).await.expect("Failed to reopen store");
    assert_eq!(reopened.get("k").await.unwrap(), Some(b"durable".to_vec()));
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let store = SqliteKvStore::new("sqlite::memory:")
        .await
        .expect("Failed to create store");
    store.close().await;

    let err = store.get("k").await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}
