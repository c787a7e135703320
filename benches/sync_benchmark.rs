//! Sync throughput benchmarks.
//!
//! Measures write and sync throughput of the Composite Store as the
//! Recency Index fills and offloads to the backing store.
//! Run with: cargo bench --bench sync_benchmark

#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use tokio::runtime::Runtime;

use tierkv::{CompositeStore, StoreOptions};

fn bench_write_below_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("CompositeStore-WriteBelowCapacity");
    let rt = Runtime::new().unwrap();

    for maxlen in [64usize, 256, 1024] {
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("write", maxlen), &maxlen, |b, &maxlen| {
            let dir = TempDir::new().unwrap();
            let store = rt.block_on(async {
                let mut store = CompositeStore::new("bench");
                store
                    .connect(
                        dir.path().join("bench.db"),
                        StoreOptions {
                            maxlen,
                            sync_fraction: 0.5,
                            table_name: "kv".to_string(),
                        },
                    )
                    .await
                    .unwrap();
                store
            });

            let mut i = 0u64;
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("k{}", i % (maxlen as u64 - 1).max(1));
                    black_box(store.write(&key, &i).await.unwrap());
                });
                i = i.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_write_driven_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("CompositeStore-WriteDrivenSync");
    let rt = Runtime::new().unwrap();

    for maxlen in [64usize, 256] {
        group.throughput(Throughput::Elements(maxlen as u64));

        group.bench_with_input(
            BenchmarkId::new("fill_and_overflow", maxlen),
            &maxlen,
            |b, &maxlen| {
                b.iter_batched(
                    || {
                        let dir = TempDir::new().unwrap();
                        let store = rt.block_on(async {
                            let mut store = CompositeStore::new("bench");
                            store
                                .connect(
                                    dir.path().join("bench.db"),
                                    StoreOptions {
                                        maxlen,
                                        sync_fraction: 0.5,
                                        table_name: "kv".to_string(),
                                    },
                                )
                                .await
                                .unwrap();
                            store
                        });
                        (dir, store)
                    },
                    |(dir, store)| {
                        rt.block_on(async {
                            for i in 0..(maxlen as u64 * 2) {
                                let key = format!("k{i}");
                                store.write(&key, &i).await.unwrap();
                            }
                        });
                        drop(dir);
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_read_hit_vs_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("CompositeStore-ReadHitVsMiss");
    let rt = Runtime::new().unwrap();
    let maxlen = 256usize;

    let dir = TempDir::new().unwrap();
    let store = rt.block_on(async {
        let mut store = CompositeStore::new("bench");
        store
            .connect(
                dir.path().join("bench.db"),
                StoreOptions {
                    maxlen,
                    sync_fraction: 0.5,
                    table_name: "kv".to_string(),
                },
            )
            .await
            .unwrap();
        for i in 0..(maxlen as u64 * 2) {
            store.write(&format!("k{i}"), &i).await.unwrap();
        }
        store
    });

    group.throughput(Throughput::Elements(1));

    group.bench_function("ri_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: Option<u64> = store.read("k511").await.unwrap();
                black_box(value);
            });
        });
    });

    group.bench_function("bs_hit_promotes", |b| {
        let mut i = 0u64;
        b.iter(|| {
            rt.block_on(async {
                // Cycling through the oldest-written half keeps re-forcing
                // promotion-then-eviction instead of settling into RI hits.
                let key = format!("k{}", i % maxlen as u64);
                let value: Option<u64> = store.read(&key).await.unwrap();
                black_box(value);
            });
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write_below_capacity,
    bench_write_driven_sync,
    bench_read_hit_vs_miss
);
criterion_main!(benches);
