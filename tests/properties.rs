//! Universal properties of the composite store, checked with `proptest`
//! over randomized key/value sequences.

use std::collections::HashSet;

use proptest::prelude::*;
use tempfile::TempDir;
use tierkv::{CompositeStore, StoreOptions};

fn run<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(f)
}

fn distinct_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("key{i}")).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// For n strictly below maxlen distinct-key writes, the cache holds
    /// all n and the backing store is empty (the n-th write that brings
    /// the count to maxlen itself triggers a sync, which is covered
    /// separately below).
    #[test]
    fn fits_without_overflow(n in 1usize..=7) {
        run(async {
            let dir = TempDir::new().unwrap();
            let mut store = CompositeStore::new("fits-without-overflow");
            store
                .connect(
                    dir.path().join("store.db"),
                    StoreOptions { maxlen: 8, sync_fraction: 0.5, table_name: "kv".into() },
                )
                .await
                .unwrap();

            for key in distinct_keys(n) {
                store.write(&key, &key).await.unwrap();
            }

            prop_assert!(store.bs_keys().await.unwrap().is_empty());
            Ok(())
        })?;
    }

    /// For n > maxlen writes with sync_fraction > 0, every written key is
    /// still retrievable and the written set equals the cache/store union.
    #[test]
    fn overflowing_writes_preserve_the_key_set(n in 9usize..=20) {
        run(async {
            let dir = TempDir::new().unwrap();
            let mut store = CompositeStore::new("preserve-key-set");
            store
                .connect(
                    dir.path().join("store.db"),
                    StoreOptions { maxlen: 8, sync_fraction: 0.5, table_name: "kv".into() },
                )
                .await
                .unwrap();

            let keys = distinct_keys(n);
            for key in &keys {
                store.write(key, key).await.unwrap();
            }

            let mut seen = HashSet::new();
            let mut it = store.iter();
            while let Some(key) = it.next().await {
                seen.insert(key.unwrap());
            }
            let expected: HashSet<String> = keys.iter().cloned().collect();
            prop_assert_eq!(seen, expected);

            for key in &keys {
                let value: Option<String> = store.read(key).await.unwrap();
                prop_assert_eq!(value, Some(key.clone()));
            }
            Ok(())
        })?;
    }

    /// Delete is idempotent and observably final.
    #[test]
    fn idempotent_delete(n in 1usize..=12) {
        run(async {
            let dir = TempDir::new().unwrap();
            let mut store = CompositeStore::new("idempotent-delete");
            store
                .connect(
                    dir.path().join("store.db"),
                    StoreOptions { maxlen: 6, sync_fraction: 0.5, table_name: "kv".into() },
                )
                .await
                .unwrap();

            let keys = distinct_keys(n);
            for key in &keys {
                store.write(key, key).await.unwrap();
            }

            let target = &keys[0];
            store.delete(target).await.unwrap();
            store.delete(target).await.unwrap();

            prop_assert!(store.read::<String>(target).await.unwrap().is_none());
            Ok(())
        })?;
    }

    /// When a sync fires with the cache at capacity, exactly
    /// floor(maxlen * sync_fraction) keys move to the backing store.
    /// Restricted to maxlen >= 4 so that a single one-past-capacity write
    /// triggers exactly one sync (for maxlen 2 or 3 with
    /// sync_fraction=0.5 the post-sync count can still reach capacity,
    /// firing a second sync on the same write sequence, which this
    /// property does not model).
    #[test]
    fn sync_size_matches_maxlen_times_fraction(maxlen in 4usize..=20) {
        run(async {
            let dir = TempDir::new().unwrap();
            let sync_fraction = 0.5;
            let mut store = CompositeStore::new("sync-size");
            store
                .connect(
                    dir.path().join("store.db"),
                    StoreOptions { maxlen, sync_fraction, table_name: "kv".into() },
                )
                .await
                .unwrap();

            // Fill the cache to capacity, then one more write to force a sync.
            let keys = distinct_keys(maxlen + 1);
            for key in &keys {
                store.write(key, key).await.unwrap();
            }

            let expected = ((maxlen as f64) * sync_fraction).floor() as usize;
            let bs_count = store.bs_keys().await.unwrap().len();
            prop_assert_eq!(bs_count, expected);
            Ok(())
        })?;
    }
}
