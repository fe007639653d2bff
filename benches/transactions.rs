// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for transaction operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use silokv::engine::{DurabilityMode, Engine, EngineConfig};
use silokv::storage::{Key, ShardedHashIndex, StorageId, Value};
use silokv::txn::TxExecutor;

const TABLE: StorageId = StorageId(0);
const RECORDS: u64 = 100_000;

struct BenchEngine {
    engine: Arc<Engine>,
    logger: Option<JoinHandle<()>>,
}

fn setup() -> (BenchEngine, TxExecutor<ShardedHashIndex>) {
    let config = EngineConfig::default()
        .with_workers(1)
        .with_loggers(1)
        .with_records_per_table(RECORDS)
        .with_epoch_interval(Duration::from_millis(40))
        .with_durability(DurabilityMode::Memory);
    let engine = Arc::new(Engine::new(config).unwrap());
    engine.init_db().unwrap();

    let logger = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.run_logger(0).unwrap())
    };
    let tx = engine.executor(0, 0).unwrap();
    (
        BenchEngine {
            engine,
            logger: Some(logger),
        },
        tx,
    )
}

impl BenchEngine {
    fn teardown(mut self, mut tx: TxExecutor<ShardedHashIndex>) {
        tx.finish();
        self.engine.notifier(0).unwrap().worker_end();
        self.engine.send_quit();
        if let Some(handle) = self.logger.take() {
            handle.join().unwrap();
        }
    }
}

fn bench_read(c: &mut Criterion) {
    let (harness, mut tx) = setup();
    let mut i = 0u64;

    c.bench_function("txn::read", |b| {
        b.iter(|| {
            tx.begin();
            let value = tx.read(TABLE, Key(i % RECORDS)).unwrap();
            i = i.wrapping_add(1);
            tx.abort();
            black_box(value)
        })
    });

    harness.teardown(tx);
}

fn bench_read_buffered(c: &mut Criterion) {
    let (harness, mut tx) = setup();

    c.bench_function("txn::read_buffered", |b| {
        tx.begin();
        tx.write(TABLE, Key(0), Value::from(1u64)).unwrap();
        b.iter(|| {
            let value = tx.read(TABLE, Key(0)).unwrap();
            black_box(value)
        });
        tx.abort();
    });

    harness.teardown(tx);
}

fn bench_write(c: &mut Criterion) {
    let (harness, mut tx) = setup();
    let mut i = 0u64;

    c.bench_function("txn::write", |b| {
        b.iter(|| {
            tx.begin();
            tx.write(TABLE, Key(i % RECORDS), Value::from(i)).unwrap();
            i = i.wrapping_add(1);
            tx.abort();
        })
    });

    harness.teardown(tx);
}

fn bench_commit_1_key(c: &mut Criterion) {
    let (harness, mut tx) = setup();
    let quit = AtomicBool::new(false);
    let mut i = 0u64;

    let mut group = c.benchmark_group("txn");
    group.throughput(Throughput::Elements(1));
    group.bench_function("commit_1_key", |b| {
        b.iter(|| {
            tx.durable_epoch_work(&quit).unwrap();
            tx.begin();
            tx.write(TABLE, Key(i % RECORDS), Value::from(i)).unwrap();
            i = i.wrapping_add(1);
            tx.commit().unwrap();
        })
    });
    group.finish();

    harness.teardown(tx);
}

fn bench_commit_10_keys(c: &mut Criterion) {
    let (harness, mut tx) = setup();
    let quit = AtomicBool::new(false);
    let mut base = 0u64;

    let mut group = c.benchmark_group("txn");
    group.throughput(Throughput::Elements(10));
    group.bench_function("commit_10_keys", |b| {
        b.iter(|| {
            tx.durable_epoch_work(&quit).unwrap();
            tx.begin();
            for offset in 0..10 {
                tx.write(TABLE, Key((base + offset) % RECORDS), Value::from(offset))
                    .unwrap();
            }
            base = base.wrapping_add(10);
            tx.commit().unwrap();
        })
    });
    group.finish();

    harness.teardown(tx);
}

fn bench_read_modify_write_commit(c: &mut Criterion) {
    let (harness, mut tx) = setup();
    let quit = AtomicBool::new(false);
    let mut i = 0u64;

    let mut group = c.benchmark_group("txn");
    group.throughput(Throughput::Elements(1));
    group.bench_function("rmw_commit", |b| {
        b.iter(|| {
            tx.durable_epoch_work(&quit).unwrap();
            tx.begin();
            let key = Key(i % RECORDS);
            let old = tx.read(TABLE, key).unwrap();
            let next = u64::from_le_bytes(*old.as_bytes()).wrapping_add(1);
            tx.write(TABLE, key, Value::from(next)).unwrap();
            i = i.wrapping_add(1);
            tx.commit().unwrap();
        })
    });
    group.finish();

    harness.teardown(tx);
}

criterion_group!(
    benches,
    bench_read,
    bench_read_buffered,
    bench_write,
    bench_commit_1_key,
    bench_commit_10_keys,
    bench_read_modify_write_commit,
);
criterion_main!(benches);
