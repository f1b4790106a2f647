//! Backing store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use idbkv_bench::{generate_records, random_data};
use idbkv_codec::{Key, KeyPath};
use idbkv_core::{BackingStore, Config, CursorDirection};
use tempfile::TempDir;

fn store_with_object_store(store: &BackingStore) -> (i64, i64) {
    let db = store.create_database("bench", "1", None).unwrap();
    let txn = store.begin();
    let os = store
        .create_object_store(&txn, db, "records", &KeyPath::Null, false)
        .unwrap();
    txn.commit().unwrap();
    (db, os)
}

fn populated(count: usize) -> (BackingStore, i64, i64) {
    let store = BackingStore::open_in_memory("bench").unwrap();
    let (db, os) = store_with_object_store(&store);
    let txn = store.begin();
    for (key, value) in generate_records(count, 128) {
        store.put_record(&txn, db, os, &key, &value).unwrap();
    }
    txn.commit().unwrap();
    (store, db, os)
}

/// Benchmark committed single-record writes.
fn bench_put_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_commit");

    for size in [64, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, &size| {
            let store = BackingStore::open_in_memory("bench").unwrap();
            let (db, os) = store_with_object_store(&store);
            let data = random_data(size);
            let mut n = 0.0;
            b.iter(|| {
                n += 1.0;
                let txn = store.begin();
                store.put_record(&txn, db, os, &Key::number(n), black_box(&data)).unwrap();
                txn.commit().unwrap();
            });
        });
    }

    group.bench_function("file_no_sync", |b| {
        let dir = TempDir::new().unwrap();
        let config = Config::new().sync_on_commit(false);
        let store = BackingStore::open(&dir.path().join("store"), "bench", &config).unwrap();
        let (db, os) = store_with_object_store(&store);
        let data = random_data(256);
        let mut n = 0.0;
        b.iter(|| {
            n += 1.0;
            let txn = store.begin();
            store.put_record(&txn, db, os, &Key::number(n), black_box(&data)).unwrap();
            txn.commit().unwrap();
        });
    });

    group.finish();
}

/// Benchmark point reads against a populated store.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for count in [100, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (store, db, os) = populated(count);
            let txn = store.begin();
            let key = Key::number((count / 2) as f64);
            b.iter(|| black_box(store.get_record(&txn, db, os, black_box(&key)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark full cursor walks in both directions.
fn bench_cursor_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_walk");
    let count = 1_000;
    group.throughput(Throughput::Elements(count as u64));

    for direction in [CursorDirection::Next, CursorDirection::Prev] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{direction:?}")),
            &direction,
            |b, &direction| {
                let (store, db, os) = populated(count);
                let txn = store.begin();
                b.iter(|| {
                    let mut seen = 0;
                    let mut cursor = store
                        .open_object_store_cursor(&txn, db, os, None, direction)
                        .unwrap();
                    while let Some(c) = cursor.as_mut() {
                        seen += 1;
                        if !c.continue_to(None).unwrap() {
                            break;
                        }
                    }
                    black_box(seen)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the auto-increment scan, which visits every record.
fn bench_next_auto_increment(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_auto_increment");

    for count in [100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let (store, db, os) = populated(count);
            let txn = store.begin();
            b.iter(|| black_box(store.next_auto_increment_number(&txn, db, os).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_put_commit,
    bench_get,
    bench_cursor_walk,
    bench_next_auto_increment,
);

criterion_main!(benches);
