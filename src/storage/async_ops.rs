//! Async wrappers for the blocking [`SqliteStore`] operations.
//!
//! Grounded in `velesdb-core/src/storage/async_ops.rs`: SQLite calls are
//! blocking syscalls that would stall the async executor if awaited
//! directly, so every operation is wrapped in `tokio::task::spawn_blocking`
//! and run on Tokio's blocking thread pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::sqlite::SqliteStore;

fn join_error(collection: &str, e: tokio::task::JoinError) -> Error {
    Error::storage(collection, e)
}

/// Asynchronously opens (or creates) the durable file and ensures the
/// collection table exists.
///
/// # Errors
///
/// Returns an error if the connection cannot be established or the
/// blocking task panics.
pub async fn open_async(path: PathBuf, table_name: String, collection: String) -> Result<Arc<SqliteStore>> {
    let collection_for_join = collection.clone();
    tokio::task::spawn_blocking(move || SqliteStore::open(path, &table_name, &collection))
        .await
        .map_err(|e| join_error(&collection_for_join, e))?
        .map(Arc::new)
}

/// Asynchronously upserts a batch of (key, value) pairs in one
/// transaction.
///
/// # Errors
///
/// Returns an error if the transaction fails or the blocking task panics.
pub async fn write_many_async(
    store: Arc<SqliteStore>,
    collection: String,
    entries: HashMap<Vec<u8>, Vec<u8>>,
) -> Result<()> {
    tokio::task::spawn_blocking(move || store.write_many(&entries))
        .await
        .map_err(|e| join_error(&collection, e))?
}

/// Asynchronously performs a point lookup.
///
/// # Errors
///
/// Returns an error if the statement fails or the blocking task panics.
pub async fn read_one_async(
    store: Arc<SqliteStore>,
    collection: String,
    key: Vec<u8>,
) -> Result<Option<Vec<u8>>> {
    tokio::task::spawn_blocking(move || store.read_one(&key))
        .await
        .map_err(|e| join_error(&collection, e))?
}

/// Asynchronously performs a multi-key lookup.
///
/// # Errors
///
/// Returns an error if the statement fails or the blocking task panics.
pub async fn read_many_async(
    store: Arc<SqliteStore>,
    collection: String,
    keys: Vec<Vec<u8>>,
) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
    tokio::task::spawn_blocking(move || store.read_many(&keys))
        .await
        .map_err(|e| join_error(&collection, e))?
}

/// Asynchronously enumerates every persisted key.
///
/// # Errors
///
/// Returns an error if the statement fails or the blocking task panics.
pub async fn keys_async(store: Arc<SqliteStore>, collection: String) -> Result<Vec<Vec<u8>>> {
    tokio::task::spawn_blocking(move || store.keys())
        .await
        .map_err(|e| join_error(&collection, e))?
}

/// Asynchronously deletes a single key.
///
/// # Errors
///
/// Returns an error if the statement fails or the blocking task panics.
pub async fn delete_async(store: Arc<SqliteStore>, collection: String, key: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || store.delete(&key))
        .await
        .map_err(|e| join_error(&collection, e))?
}

/// Asynchronously flushes and closes the connection.
///
/// # Errors
///
/// Returns an error if the engine refuses to close cleanly or the
/// blocking task panics.
pub async fn close_async(store: Arc<SqliteStore>, collection: String) -> Result<()> {
    tokio::task::spawn_blocking(move || store.close())
        .await
        .map_err(|e| join_error(&collection, e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, Arc<SqliteStore>) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db"), "kv", "test").unwrap();
        (dir, Arc::new(store))
    }

    #[tokio::test]
    async fn write_many_async_then_read_many_async_round_trips() {
        let (_dir, store) = store();
        let mut batch = HashMap::new();
        batch.insert(b"a".to_vec(), b"1".to_vec());
        write_many_async(store.clone(), "test".into(), batch).await.unwrap();

        let value = read_one_async(store, "test".into(), b"a".to_vec()).await.unwrap();
        assert_eq!(value, Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn write_many_async_is_atomic() {
        let (_dir, store) = store();
        let mut batch = HashMap::new();
        batch.insert(b"x".to_vec(), b"10".to_vec());
        batch.insert(b"y".to_vec(), b"20".to_vec());
        write_many_async(store.clone(), "test".into(), batch).await.unwrap();

        let found = read_many_async(store, "test".into(), vec![b"x".to_vec(), b"y".to_vec()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn close_async_releases_the_connection() {
        let (_dir, store) = store();
        close_async(store.clone(), "test".into()).await.unwrap();
        let mut batch = HashMap::new();
        batch.insert(b"a".to_vec(), b"1".to_vec());
        let err = write_many_async(store, "test".into(), batch).await.unwrap_err();
        assert_eq!(err.code(), "TIER-004");
    }
}
