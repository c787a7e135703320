//! Recency Index (RI): a bounded key→value map with a recency ordering.
//!
//! Mirrors `original_source/src/notebooks/lib/lru.py`'s `LRU` class in
//! structure (a key index plus a separate double-ended ordering), rather
//! than `velesdb-core/src/cache/lru.rs`'s fused `IndexMap` trick — the two
//! need to be separately observable so that a divergence between them can
//! be reported as `Corrupt` rather than silently tolerated. `deck_full` is
//! kept as an explicit derived predicate recomputed whenever `count`
//! changes rather than folded into a setter.

use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};

/// Values held by the Recency Index are always raw, already-serialized
/// bytes, not deserialized values — the index stays homogeneous
/// regardless of what type callers write.
pub type Blob = Vec<u8>;

/// The bounded in-memory recency index sitting in front of the backing
/// store.
///
/// `order` holds resident keys with the least-recently-used key at the
/// front and the most-recently-used key at the back. `index` is the
/// key→value map. The two must stay in 1:1 correspondence; `count`
/// must always equal `index.len()`.
pub struct RecencyIndex {
    maxlen: usize,
    order: VecDeque<Blob>,
    index: HashMap<Blob, Blob>,
    count: usize,
}

impl RecencyIndex {
    /// Initializes an empty Recency Index with the given capacity.
    #[must_use]
    pub fn create_empty(maxlen: usize) -> Self {
        Self {
            maxlen,
            order: VecDeque::with_capacity(maxlen),
            index: HashMap::with_capacity(maxlen),
            count: 0,
        }
    }

    /// RI capacity.
    #[must_use]
    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    /// Size of the key index (always equal to `count`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no keys are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Membership test on the key index.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Derived predicate: true exactly when `count >= maxlen`.
    #[must_use]
    pub fn deck_full(&self) -> bool {
        self.count >= self.maxlen
    }

    /// Returns the resident value for `key`, moving it to the MRU end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key is absent. Returns
    /// [`Error::Corrupt`] if the key is present in the index but missing
    /// from the ordering.
    pub fn get(&mut self, collection: &str, key: &[u8]) -> Result<Blob> {
        let Some(value) = self.index.get(key).cloned() else {
            return Err(Error::NotFound {
                collection: collection.to_string(),
                key: key.to_vec(),
            });
        };
        self.touch(collection, key)?;
        Ok(value)
    }

    /// As [`RecencyIndex::get`], but returns `default` instead of an error
    /// on absence, and never touches recency on a miss.
    pub fn get_or_default(&mut self, collection: &str, key: &[u8], default: Blob) -> Blob {
        match self.get(collection, key) {
            Ok(value) => value,
            Err(_) => default,
        }
    }

    /// Inserts or updates `key`, moving it to the MRU end.
    pub fn put(&mut self, key: Blob, value: Blob) {
        if self.index.contains_key(&key) {
            self.remove_from_order(&key);
            self.order.push_back(key.clone());
            self.index.insert(key, value);
        } else {
            self.order.push_back(key.clone());
            self.index.insert(key, value);
            self.count += 1;
        }
    }

    /// Removes `key` from both the index and the ordering. Idempotent: no
    /// error if the key is absent.
    pub fn delete(&mut self, key: &[u8]) {
        if self.index.remove(key).is_some() {
            self.remove_from_order(key);
            self.count -= 1;
        }
    }

    /// Snapshot of resident keys, MRU-first.
    #[must_use]
    pub fn iter(&self) -> Vec<Blob> {
        self.order.iter().rev().cloned().collect()
    }

    /// Previews the oldest `floor(maxlen * fraction)` resident entries a
    /// sync would evict, keyed by their current values. Does not mutate
    /// the index or the ordering: the caller must confirm the entries
    /// made it into the backing store (via [`RecencyIndex::evict`]) before
    /// they are allowed to leave the index. `fraction` is clamped to
    /// `[0.0, 1.0]`; the count previewed is based on `maxlen`, not the
    /// current length.
    #[must_use]
    pub fn peek_sync_batch(&self, fraction: f64) -> HashMap<Blob, Blob> {
        let fraction = fraction.clamp(0.0, 1.0);
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let split = ((self.maxlen as f64) * fraction).floor() as usize;
        let split = split.min(self.order.len());

        self.order
            .iter()
            .take(split)
            .filter_map(|key| self.index.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    /// Previews every resident entry, used by `flush_cache` ahead of its
    /// backing-store write. Does not mutate the index or the ordering.
    #[must_use]
    pub fn peek_all(&self) -> HashMap<Blob, Blob> {
        self.index.clone()
    }

    /// Removes `keys` from both the index and the ordering, decrementing
    /// `count` for each one actually present. Call only after the
    /// corresponding values are durably written to the backing store: a
    /// key not yet confirmed there must stay resident so a failed or
    /// cancelled write leaves it fully recoverable from the index rather
    /// than lost from both tiers. Idempotent per key.
    pub fn evict<I: IntoIterator<Item = Blob>>(&mut self, keys: I) {
        for key in keys {
            if self.index.remove(&key).is_some() {
                self.remove_from_order(&key);
                self.count -= 1;
            }
        }
    }

    /// Checks that `count == index.len()`, used by the Composite Store's
    /// post-sync assertion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] on mismatch.
    pub fn assert_consistent(&self, collection: &str) -> Result<()> {
        if self.count != self.index.len() {
            return Err(Error::Corrupt {
                collection: collection.to_string(),
                detail: format!(
                    "count {} does not match index length {} after sync",
                    self.count,
                    self.index.len()
                ),
            });
        }
        Ok(())
    }

    fn touch(&mut self, collection: &str, key: &[u8]) -> Result<()> {
        if self.remove_from_order(key).is_none() {
            return Err(Error::Corrupt {
                collection: collection.to_string(),
                detail: format!(
                    "key {key:?} present in index but missing from recency ordering"
                ),
            });
        }
        self.order.push_back(key.to_vec());
        Ok(())
    }

    fn remove_from_order(&mut self, key: &[u8]) -> Option<Blob> {
        let pos = self.order.iter().position(|k| k.as_slice() == key)?;
        self.order.remove(pos)
    }
}
