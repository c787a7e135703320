//! Composite Store (CS): orchestrates the Recency Index (RI) and Backing
//! Store (BS) behind a single asynchronous facade. Routes reads and
//! writes, triggers sync on fullness, encodes/decodes keys,
//! serializes/deserializes values, and exposes the public API. Grounded in
//! `velesdb-core`'s facade style (`Database`/`Collection` in `lib.rs`)
//! combined with `original_source/src/notebooks/lib/lru_database.py`'s
//! `LRUDataBase`, whose `write`/`read`/`sync`/`flush_cache`/`close`
//! protocol this module reproduces with Rust types in place of Python's
//! duck typing.

mod iter;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::codec::{decode_key, encode_key, deserialize_value, serialize_value};
use crate::error::{Error, Result};
use crate::recency::RecencyIndex;
use crate::storage::{async_ops, SqliteStore};

pub use iter::CollectionIter;

/// Configuration accepted by [`CompositeStore::connect`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// RI capacity.
    pub maxlen: usize,
    /// Proportion of RI evicted per sync, clamped to `[0.0, 1.0]`.
    pub sync_fraction: f64,
    /// Name of the SQL table backing this collection.
    pub table_name: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            maxlen: 500,
            sync_fraction: 0.5,
            table_name: "store".to_string(),
        }
    }
}

enum State {
    New,
    Open { ri: RecencyIndex, bs: Arc<SqliteStore> },
    Closed,
}

/// The composite key/value store facade: a bounded recency cache in
/// front of a durable backing store.
///
/// Follows the `[new] --connect--> [open] --...--> [open] --close--> [closed]`
/// state machine: every operation on `[new]` or `[closed]` raises
/// [`Error::NotOpen`].
pub struct CompositeStore {
    collection: String,
    sync_fraction: f64,
    state: Mutex<State>,
}

impl CompositeStore {
    /// Constructs a store handle in the `[new]` state. Call
    /// [`CompositeStore::connect`] before using it.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            sync_fraction: 0.5,
            state: Mutex::new(State::New),
        }
    }

    /// Opens the durable file at `path`, constructs the Recency Index with
    /// the configured capacity, and ensures the backing table exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the connection cannot be established.
    pub async fn connect(&mut self, path: impl Into<PathBuf>, options: StoreOptions) -> Result<()> {
        let bs = async_ops::open_async(path.into(), options.table_name, self.collection.clone()).await?;
        let ri = RecencyIndex::create_empty(options.maxlen);
        self.sync_fraction = options.sync_fraction.clamp(0.0, 1.0);
        *self.state.lock().await = State::Open { ri, bs };
        Ok(())
    }

    /// Encodes `key`, serializes `value`, and writes it into RI. If RI
    /// reports full afterward, triggers [`CompositeStore::sync`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open, or an
    /// error from the triggered sync.
    pub async fn write<V: Serialize>(&self, key: &str, value: &V) -> Result<()> {
        let encoded_key = encode_key(key);
        let blob = serialize_value(value)?;

        let mut guard = self.state.lock().await;
        let State::Open { ri, bs } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        ri.put(encoded_key, blob);
        let needs_sync = ri.deck_full();
        let bs = bs.clone();
        drop(guard);

        if needs_sync {
            self.sync(bs).await?;
        }
        Ok(())
    }

    /// Reads `key`: consults RI first, then BS. A value found in BS is
    /// promoted into RI (which may itself trigger a sync).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn read<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        let encoded_key = encode_key(key);

        let mut guard = self.state.lock().await;
        let State::Open { ri, bs } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        if ri.contains(&encoded_key) {
            let blob = ri.get(&self.collection, &encoded_key)?;
            return Ok(Some(deserialize_value(&blob)?));
        }
        let bs = bs.clone();
        drop(guard);

        match async_ops::read_one_async(bs, self.collection.clone(), encoded_key.clone()).await? {
            Some(blob) => {
                let value: V = deserialize_value(&blob)?;
                self.promote(encoded_key, blob).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// As [`CompositeStore::read`], returning `default` on absence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn get<V: DeserializeOwned>(&self, key: &str, default: V) -> Result<V> {
        Ok(self.read(key).await?.unwrap_or(default))
    }

    /// Reads many keys at once: RI hits are deserialized in place, misses
    /// are fetched from BS in a single multi-key query, and every value
    /// found in BS is promoted into RI. Absent keys map to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn read_many<V: DeserializeOwned>(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, Option<V>>> {
        let mut results: HashMap<String, Option<V>> = HashMap::with_capacity(keys.len());
        let mut misses: Vec<Vec<u8>> = Vec::new();
        let mut miss_text: HashMap<Vec<u8>, String> = HashMap::new();

        {
            let mut guard = self.state.lock().await;
            let State::Open { ri, .. } = &mut *guard else {
                return Err(Error::NotOpen(self.collection.clone()));
            };
            for &key in keys {
                let encoded_key = encode_key(key);
                if ri.contains(&encoded_key) {
                    let blob = ri.get(&self.collection, &encoded_key)?;
                    results.insert(key.to_string(), Some(deserialize_value(&blob)?));
                } else {
                    miss_text.insert(encoded_key.clone(), key.to_string());
                    misses.push(encoded_key);
                }
            }
        }

        if misses.is_empty() {
            return Ok(results);
        }

        let bs = self.bs_handle().await?;
        let found = async_ops::read_many_async(bs, self.collection.clone(), misses.clone()).await?;

        for encoded_key in misses {
            let key = miss_text.remove(&encoded_key).expect("tracked above");
            match found.get(&encoded_key) {
                Some(blob) => {
                    let value: V = deserialize_value(blob)?;
                    self.promote(encoded_key, blob.clone()).await?;
                    results.insert(key, Some(value));
                }
                None => {
                    results.insert(key, None);
                }
            }
        }

        Ok(results)
    }

    /// Deletes `key` from BS first, then RI. Idempotent on an RI miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let encoded_key = encode_key(key);
        let bs = self.bs_handle().await?;
        async_ops::delete_async(bs, self.collection.clone(), encoded_key.clone()).await?;

        let mut guard = self.state.lock().await;
        let State::Open { ri, .. } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        ri.delete(&encoded_key);
        Ok(())
    }

    /// Returns an async iterator over the union of RI-resident and
    /// BS-persisted keys, decoded back to text, each yielded exactly once.
    #[must_use]
    pub fn iter(&self) -> CollectionIter<'_> {
        CollectionIter::new(self)
    }

    /// Raw key enumeration of the Backing Store alone (bypasses RI),
    /// mirroring `node_keys()` in the original prototype.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn bs_keys(&self) -> Result<Vec<String>> {
        let bs = self.bs_handle().await?;
        let raw = async_ops::keys_async(bs, self.collection.clone()).await?;
        raw.iter().map(|k| decode_key(k)).collect()
    }

    /// Writes the entire RI key→value mapping to BS in one upsert, then
    /// resets RI to empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the collection is not open.
    pub async fn flush_cache(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        let State::Open { ri, bs } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        let batch = ri.peek_all();
        let count = batch.len();
        let bs = bs.clone();
        drop(guard);

        async_ops::write_many_async(bs, self.collection.clone(), batch.clone()).await?;

        let mut guard = self.state.lock().await;
        if let State::Open { ri, .. } = &mut *guard {
            ri.evict(batch.into_keys());
        }
        info!(collection = %self.collection, count, "flushed cache to backing store");
        Ok(())
    }

    /// Closes the collection: flushes the cache, then closes BS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if already closed, or any error raised
    /// while flushing or closing.
    pub async fn close(&self) -> Result<()> {
        self.flush_cache().await?;
        let bs = self.bs_handle().await?;
        async_ops::close_async(bs, self.collection.clone()).await?;
        *self.state.lock().await = State::Closed;
        Ok(())
    }

    /// Connects, runs `f`, and always closes afterward (even if `f`
    /// errors) — an idiomatic analogue of the original prototype's
    /// `async with LRUDataBase(...) as shelf`.
    ///
    /// # Errors
    ///
    /// Returns the first error from `connect`, `f`, or `close`.
    pub async fn with_store<F, Fut, T>(
        path: impl Into<PathBuf>,
        collection: impl Into<String>,
        options: StoreOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&CompositeStore) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut store = Self::new(collection);
        store.connect(path, options).await?;
        let result = f(&store).await;
        let close_result = store.close().await;
        let value = result?;
        close_result?;
        Ok(value)
    }

    async fn sync(&self, bs: Arc<SqliteStore>) -> Result<()> {
        let mut guard = self.state.lock().await;
        let State::Open { ri, .. } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        let batch = ri.peek_sync_batch(self.sync_fraction);
        let count = batch.len();
        drop(guard);

        // Only once this write has returned `Ok` are the batch's keys
        // allowed to leave the index: a failed or cancelled write here
        // leaves every key still resident and still in the backing store
        // (if it was already there), so the collection never observes a
        // key missing from both tiers at once.
        async_ops::write_many_async(bs, self.collection.clone(), batch.clone()).await?;

        let mut guard = self.state.lock().await;
        if let State::Open { ri, .. } = &mut *guard {
            ri.evict(batch.into_keys());
            ri.assert_consistent(&self.collection)?;
        }
        info!(collection = %self.collection, count, "sync offloaded cached items to the backing store");
        Ok(())
    }

    async fn promote(&self, encoded_key: Vec<u8>, blob: Vec<u8>) -> Result<()> {
        let mut guard = self.state.lock().await;
        let State::Open { ri, bs } = &mut *guard else {
            return Err(Error::NotOpen(self.collection.clone()));
        };
        ri.put(encoded_key, blob);
        let needs_sync = ri.deck_full();
        let bs = bs.clone();
        drop(guard);

        if needs_sync {
            self.sync(bs).await?;
        }
        Ok(())
    }

    async fn bs_handle(&self) -> Result<Arc<SqliteStore>> {
        let guard = self.state.lock().await;
        match &*guard {
            State::Open { bs, .. } => Ok(bs.clone()),
            _ => Err(Error::NotOpen(self.collection.clone())),
        }
    }

    pub(crate) async fn ri_keys_mru_first(&self) -> Result<Vec<Vec<u8>>> {
        let guard = self.state.lock().await;
        match &*guard {
            State::Open { ri, .. } => Ok(ri.iter()),
            _ => Err(Error::NotOpen(self.collection.clone())),
        }
    }

    /// One-time snapshot of the union of RI-resident and BS-persisted
    /// keys, decoded to text, each appearing exactly once. Used by
    /// [`CollectionIter`] on its first step.
    pub(crate) async fn snapshot_union_keys(&self) -> Result<Vec<String>> {
        let ri_keys = self.ri_keys_mru_first().await?;
        let bs = self.bs_handle().await?;
        let bs_keys = async_ops::keys_async(bs, self.collection.clone()).await?;

        let mut seen: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(ri_keys.len() + bs_keys.len());
        for key in ri_keys {
            if seen.insert(key.clone()) {
                out.push(decode_key(&key)?);
            }
        }
        for key in bs_keys {
            if seen.insert(key.clone()) {
                out.push(decode_key(&key)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, CompositeStore) {
        let dir = TempDir::new().unwrap();
        let mut store = CompositeStore::new("test");
        let options = StoreOptions {
            maxlen: 4,
            sync_fraction: 0.5,
            table_name: "kv".to_string(),
        };
        store.connect(dir.path().join("test.db"), options).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn s1_fills_without_sync() {
        let (_dir, store) = open_store().await;
        store.write("a", &1u64).await.unwrap();
        store.write("b", &2u64).await.unwrap();
        store.write("c", &3u64).await.unwrap();

        let keys: Vec<String> = store
            .ri_keys_mru_first()
            .await
            .unwrap()
            .iter()
            .map(|k| decode_key(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
        assert!(store.bs_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn s2_touch_reorders() {
        let (_dir, store) = open_store().await;
        store.write("a", &1u64).await.unwrap();
        store.write("b", &2u64).await.unwrap();
        store.write("c", &3u64).await.unwrap();

        let value: u64 = store.read("a").await.unwrap().unwrap();
        assert_eq!(value, 1);

        let keys: Vec<String> = store
            .ri_keys_mru_first()
            .await
            .unwrap()
            .iter()
            .map(|k| decode_key(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn s3_sync_on_full() {
        let (_dir, store) = open_store().await;
        store.write("a", &1u64).await.unwrap();
        store.write("b", &2u64).await.unwrap();
        store.write("c", &3u64).await.unwrap();
        store.read::<u64>("a").await.unwrap();
        store.write("d", &4u64).await.unwrap();

        let keys: Vec<String> = store
            .ri_keys_mru_first()
            .await
            .unwrap()
            .iter()
            .map(|k| decode_key(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["d", "a"]);

        let mut bs_keys = store.bs_keys().await.unwrap();
        bs_keys.sort();
        assert_eq!(bs_keys, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn s4_s5_s6_miss_promotes_delete_and_close_flush() {
        let (dir, store) = open_store().await;
        store.write("a", &1u64).await.unwrap();
        store.write("b", &2u64).await.unwrap();
        store.write("c", &3u64).await.unwrap();
        store.read::<u64>("a").await.unwrap();
        store.write("d", &4u64).await.unwrap();

        let value: u64 = store.read("b").await.unwrap().unwrap();
        assert_eq!(value, 2);
        let keys: Vec<String> = store
            .ri_keys_mru_first()
            .await
            .unwrap()
            .iter()
            .map(|k| decode_key(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["b", "d", "a"]);

        store.delete("a").await.unwrap();
        assert!(store.read::<u64>("a").await.unwrap().is_none());

        let mut all = Vec::new();
        let mut it = store.iter();
        while let Some(key) = it.next().await {
            all.push(key.unwrap());
        }
        assert!(!all.contains(&"a".to_string()));

        store.close().await.unwrap();

        let db_path = dir.path().join("test.db");
        let mut reopened = CompositeStore::new("test");
        reopened
            .connect(
                db_path,
                StoreOptions {
                    maxlen: 4,
                    sync_fraction: 0.5,
                    table_name: "kv".to_string(),
                },
            )
            .await
            .unwrap();
        let mut persisted = reopened.bs_keys().await.unwrap();
        persisted.sort();
        assert_eq!(persisted, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn operations_before_connect_are_not_open() {
        let store = CompositeStore::new("never-connected");
        let err = store.write("a", &1u64).await.unwrap_err();
        assert_eq!(err.code(), "TIER-004");
    }
}
