// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The host-facing engine: wiring, thread bodies, and the control surface.
//!
//! The surrounding driver owns the OS threads; this module provides what
//! runs on them. [`Engine::run_worker`] is the full worker body (wait for
//! logger and start, then the transaction retry loop until quit), and
//! [`Engine::run_logger`] is the logger body. The driver calls
//! [`Engine::init_db`] once, spawns the threads, fires
//! [`Engine::send_start`], and ends the run with [`Engine::send_quit`];
//! results come back through the per-worker counters and the durable
//! epoch.
//!
//! # Example
//!
//! ```no_run
//! use std::thread;
//! use std::time::Duration;
//! use silokv::engine::{DurabilityMode, Engine, EngineConfig};
//! use silokv::workload::UniformWorkload;
//!
//! let config = EngineConfig::default()
//!     .with_workers(2)
//!     .with_loggers(1)
//!     .with_durability(DurabilityMode::Memory);
//! let engine = Engine::new(config).unwrap();
//! engine.init_db().unwrap();
//!
//! thread::scope(|s| {
//!     s.spawn(|| engine.run_logger(0));
//!     for worker in 0..2 {
//!         let engine = &engine;
//!         s.spawn(move || {
//!             let mut workload = UniformWorkload::new(worker as u64, 100_000, 10, 50);
//!             engine.run_worker(worker, engine.affinity().logger_for(worker), &mut workload)
//!         });
//!     }
//!     engine.send_start();
//!     thread::sleep(Duration::from_secs(3));
//!     engine.send_quit();
//! });
//!
//! println!("commits: {}", engine.total_commit_count());
//! ```

mod affinity;
mod config;
mod error;
mod stats;

pub use affinity::LoggerAffinity;
pub use config::{DurabilityMode, EngineConfig};
pub use error::EngineError;
pub use stats::WorkerStats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::epoch::EpochClock;
use crate::log::{
    DurableSink, FileSink, Logger, LoggerStats, MemorySink, Notifier,
};
use crate::storage::{Index, Key, Record, ShardedHashIndex, StorageId, Value};
use crate::txn::{AbortReason, TxExecutor, TxnError};
use crate::workload::{Op, Procedure, Workload};

/// The transactional engine: one instance per process, shared by
/// reference with every worker and logger thread.
pub struct Engine<I: Index = ShardedHashIndex> {
    config: EngineConfig,
    clock: Arc<EpochClock>,
    index: Arc<I>,
    affinity: LoggerAffinity,
    notifiers: Vec<Arc<Notifier>>,
    epoch_sink: Arc<Mutex<Box<dyn DurableSink>>>,
    start: AtomicBool,
    quit: AtomicBool,
    worker_stats: Vec<Arc<WorkerStats>>,
    logger_stats: Vec<Arc<LoggerStats>>,
}

impl Engine<ShardedHashIndex> {
    /// Builds an engine over the default sharded hash index.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let index = ShardedHashIndex::new(config.tables);
        Self::with_index(config, index)
    }
}

impl<I: Index> Engine<I> {
    /// Builds an engine over a caller-provided index implementation.
    pub fn with_index(config: EngineConfig, index: I) -> Result<Self, EngineError> {
        config.validate()?;
        let affinity = LoggerAffinity::new(config.workers, config.loggers);
        let clock = Arc::new(EpochClock::new(
            config.workers,
            config.loggers,
            config.epoch_interval,
        ));
        let notifiers = (0..config.loggers)
            .map(|logger| {
                Arc::new(Notifier::new(
                    affinity.workers_of(logger),
                    config.buffers_per_worker,
                    config.buffer_capacity,
                ))
            })
            .collect();
        let epoch_sink: Box<dyn DurableSink> = match config.durability {
            DurabilityMode::File => {
                std::fs::create_dir_all(&config.log_dir)?;
                Box::new(FileSink::create(&config.log_dir.join("durable_epoch.dat"))?)
            }
            DurabilityMode::Memory => Box::new(MemorySink::new()),
        };
        Ok(Self {
            clock,
            index: Arc::new(index),
            affinity,
            notifiers,
            epoch_sink: Arc::new(Mutex::new(epoch_sink)),
            start: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            worker_stats: (0..config.workers)
                .map(|_| Arc::new(WorkerStats::new()))
                .collect(),
            logger_stats: (0..config.loggers)
                .map(|_| Arc::new(LoggerStats::new()))
                .collect(),
            config,
        })
    }

    /// Populates every table with keys `0..records_per_table`, zeroed
    /// payloads, version words at the initial epoch.
    pub fn init_db(&self) -> Result<(), EngineError> {
        let began = Instant::now();
        for table in 0..self.config.tables {
            let table = StorageId(table as u32);
            for key in 0..self.config.records_per_table {
                self.index
                    .insert(table, Key(key), Arc::new(Record::new(Value::default())))
                    .map_err(|e| EngineError::Config(format!("init_db: {e}")))?;
            }
        }
        info!(
            tables = self.config.tables,
            records = self.config.records_per_table,
            elapsed_ms = began.elapsed().as_millis() as u64,
            "database initialized"
        );
        Ok(())
    }

    /// Wires up the executor for one worker. One call per worker per run;
    /// [`Engine::run_worker`] does this internally.
    pub fn executor(&self, worker_id: usize, group_id: usize) -> Result<TxExecutor<I>, EngineError> {
        let notifier = self
            .notifiers
            .get(group_id)
            .ok_or(EngineError::UnknownLogger(group_id))?;
        let pool = notifier
            .register(worker_id)
            .ok_or(EngineError::UnknownWorker(worker_id))?;
        Ok(TxExecutor::new(
            worker_id,
            group_id,
            Arc::clone(&self.clock),
            Arc::clone(&self.index),
            pool,
            self.config.epoch_diff,
        ))
    }

    /// The worker thread body: blocks for the group's logger and the
    /// start signal, then runs transactions until quit. Expected failures
    /// (conflicts, misses) are retried in place; only log-pipeline
    /// exhaustion returns an error.
    pub fn run_worker<W: Workload>(
        &self,
        worker_id: usize,
        group_id: usize,
        workload: &mut W,
    ) -> Result<(), EngineError> {
        let mut tx = self.executor(worker_id, group_id)?;
        let notifier = Arc::clone(&self.notifiers[group_id]);
        let stats = Arc::clone(&self.worker_stats[worker_id]);

        // Logger discovery: epoch work keeps the clock moving while the
        // logger comes up.
        while !notifier.logger_published() {
            tx.epoch_work();
            if self.quit.load(Ordering::Acquire) {
                tx.finish();
                notifier.worker_end();
                return Ok(());
            }
        }
        // Start gate.
        while !self.start.load(Ordering::Acquire) {
            if self.quit.load(Ordering::Acquire) {
                tx.finish();
                notifier.worker_end();
                return Ok(());
            }
            std::hint::spin_loop();
        }

        let mut procedures: Vec<Procedure> = Vec::new();
        'run: while !self.quit.load(Ordering::Acquire) {
            workload.next_transaction(&mut procedures);

            // The retry loop re-executes the same procedures until the
            // attempt commits.
            loop {
                if tx.is_leader() {
                    tx.leader_work();
                }
                if tx.durable_epoch_work(&self.quit).is_err() {
                    stats.record_abort(Some(AbortReason::BufferExhaustion));
                    error!(worker = worker_id, "log buffer pool exhausted");
                    tx.finish();
                    notifier.worker_end();
                    return Err(EngineError::BufferExhaustion(worker_id));
                }
                if self.quit.load(Ordering::Acquire) {
                    break 'run;
                }

                tx.begin();
                let mut op_failed = false;
                for procedure in &procedures {
                    let result = match procedure.op {
                        Op::Read => tx.read(procedure.table, procedure.key).map(|_| ()),
                        Op::Write => tx.write(procedure.table, procedure.key, procedure.value),
                        Op::ReadModifyWrite => match tx.read(procedure.table, procedure.key) {
                            Ok(_) => tx.write(procedure.table, procedure.key, procedure.value),
                            Err(e) => Err(e),
                        },
                    };
                    if result.is_err() {
                        op_failed = true;
                        break;
                    }
                }
                if op_failed {
                    tx.abort();
                    stats.record_abort(None);
                    continue;
                }

                match tx.commit() {
                    Ok(()) => {
                        stats.record_commit();
                        break;
                    }
                    Err(TxnError::Aborted(reason)) => {
                        tx.abort();
                        stats.record_abort(Some(reason));
                    }
                    Err(TxnError::BufferExhaustion) => {
                        stats.record_abort(Some(AbortReason::BufferExhaustion));
                        error!(worker = worker_id, "log buffer pool exhausted mid-commit");
                        tx.finish();
                        notifier.worker_end();
                        return Err(EngineError::BufferExhaustion(worker_id));
                    }
                    Err(_) => {
                        tx.abort();
                        stats.record_abort(None);
                    }
                }
            }
        }

        // Hand the logger whatever the last epoch left behind, then
        // deregister so it can reach its final durable epoch.
        tx.finish();
        notifier.worker_end();
        Ok(())
    }

    /// The logger thread body, with the sink chosen by the configured
    /// durability mode.
    pub fn run_logger(&self, logger_id: usize) -> Result<(), EngineError> {
        match self.config.durability {
            DurabilityMode::File => {
                std::fs::create_dir_all(&self.config.log_dir)?;
                let path = self.config.log_dir.join(format!("log{logger_id}.dat"));
                self.run_logger_with(logger_id, FileSink::create(&path)?)
            }
            DurabilityMode::Memory => self.run_logger_with(logger_id, MemorySink::new()),
        }
    }

    /// The logger thread body over a caller-provided sink.
    pub fn run_logger_with<S: DurableSink>(
        &self,
        logger_id: usize,
        sink: S,
    ) -> Result<(), EngineError> {
        let notifier = self
            .notifiers
            .get(logger_id)
            .ok_or(EngineError::UnknownLogger(logger_id))?;
        let poll = (self.config.epoch_interval / 4).max(Duration::from_millis(1));
        let mut logger = Logger::new(
            logger_id,
            Arc::clone(&self.clock),
            Arc::clone(notifier),
            sink,
            Arc::clone(&self.epoch_sink),
            Arc::clone(&self.logger_stats[logger_id]),
            poll,
        );
        logger.run(&self.quit)?;
        Ok(())
    }

    /// Releases every worker from the start gate.
    pub fn send_start(&self) {
        info!("benchmark start");
        self.start.store(true, Ordering::Release);
    }

    /// Asks every worker and logger to wind down cooperatively.
    pub fn send_quit(&self) {
        info!("benchmark quit");
        self.quit.store(true, Ordering::Release);
    }

    pub fn commit_count(&self, worker_id: usize) -> u64 {
        self.worker_stats
            .get(worker_id)
            .map_or(0, |s| s.commit_count())
    }

    pub fn abort_count(&self, worker_id: usize) -> u64 {
        self.worker_stats
            .get(worker_id)
            .map_or(0, |s| s.abort_count())
    }

    pub fn abort_reason_count(&self, worker_id: usize, reason: AbortReason) -> u64 {
        self.worker_stats
            .get(worker_id)
            .map_or(0, |s| s.abort_reason_count(reason))
    }

    pub fn total_commit_count(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.commit_count()).sum()
    }

    pub fn total_abort_count(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.abort_count()).sum()
    }

    /// The process durable epoch: all commits at or below it are
    /// persisted.
    pub fn durable_epoch(&self) -> u64 {
        self.clock.durable_epoch()
    }

    pub fn logger_stats(&self, logger_id: usize) -> Option<&Arc<LoggerStats>> {
        self.logger_stats.get(logger_id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn affinity(&self) -> &LoggerAffinity {
        &self.affinity
    }

    /// The rendezvous hub for one logger group. Drivers that run executors
    /// directly (rather than through [`Engine::run_worker`]) deregister
    /// their workers through this.
    pub fn notifier(&self, group_id: usize) -> Option<&Arc<Notifier>> {
        self.notifiers.get(group_id)
    }

    pub fn clock(&self) -> &Arc<EpochClock> {
        &self.clock
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::UniformWorkload;
    use std::thread;

    fn test_config() -> EngineConfig {
        EngineConfig::default()
            .with_workers(2)
            .with_loggers(1)
            .with_records_per_table(512)
            .with_epoch_interval(Duration::from_millis(1))
            .with_buffers_per_worker(8)
            .with_buffer_capacity(64)
            .with_durability(DurabilityMode::Memory)
    }

    fn run_benchmark(engine: &Engine, window: Duration) {
        thread::scope(|s| {
            let logger = s.spawn(|| engine.run_logger(0));
            let workers: Vec<_> = (0..engine.config().workers)
                .map(|worker| {
                    s.spawn(move || {
                        let records = engine.config().records_per_table;
                        let mut workload = UniformWorkload::new(worker as u64, records, 4, 50);
                        engine.run_worker(worker, engine.affinity().logger_for(worker), &mut workload)
                    })
                })
                .collect();

            engine.send_start();
            thread::sleep(window);
            engine.send_quit();

            for handle in workers {
                handle.join().unwrap().unwrap();
            }
            logger.join().unwrap().unwrap();
        });
    }

    #[test]
    fn test_init_db_populates_tables() {
        let engine = Engine::new(test_config().with_tables(2)).unwrap();
        engine.init_db().unwrap();

        for table in 0..2u32 {
            let record = engine.index().get(StorageId(table), Key(511)).unwrap();
            assert_eq!(record.payload(), Value::default());
            assert_eq!(record.version().epoch(), 1);
            assert!(record.version().is_latest());
        }
        assert!(engine.index().get(StorageId(0), Key(512)).is_none());
    }

    #[test]
    fn test_smoke_run_commits_and_advances_durable_epoch() {
        let engine = Engine::new(test_config()).unwrap();
        engine.init_db().unwrap();

        run_benchmark(&engine, Duration::from_millis(150));

        assert!(engine.total_commit_count() > 0);
        assert_eq!(
            engine.total_commit_count(),
            engine.commit_count(0) + engine.commit_count(1)
        );

        // Something was flushed, and the durable epoch moved but never
        // past any worker's local epoch.
        let stats = engine.logger_stats(0).unwrap();
        assert!(stats.records_flushed() > 0);
        assert!(stats.bytes_written() > 0);
        assert!(engine.durable_epoch() >= 1);
        let min_local = (0..2).map(|w| engine.clock().worker_epoch(w)).min().unwrap();
        assert!(engine.durable_epoch() <= min_local);

        // Every record the run left behind is unlocked and consistent.
        for key in 0..512 {
            let record = engine.index().get(StorageId(0), Key(key)).unwrap();
            assert!(!record.version().is_locked());
        }
    }

    #[test]
    fn test_abort_reasons_never_exceed_total() {
        let engine = Engine::new(test_config()).unwrap();
        engine.init_db().unwrap();
        run_benchmark(&engine, Duration::from_millis(80));

        for worker in 0..2 {
            let by_reason: u64 = AbortReason::ALL
                .iter()
                .map(|&r| engine.abort_reason_count(worker, r))
                .sum();
            assert!(by_reason <= engine.abort_count(worker));
        }
    }

    #[test]
    fn test_file_mode_persists_log_streams() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config()
            .with_durability(DurabilityMode::File)
            .with_log_dir(dir.path());
        let engine = Engine::new(config).unwrap();
        engine.init_db().unwrap();

        run_benchmark(&engine, Duration::from_millis(120));

        let log = std::fs::read(dir.path().join("log0.dat")).unwrap();
        assert!(!log.is_empty());
        let persisted = std::fs::read(dir.path().join("durable_epoch.dat")).unwrap();
        assert!(!persisted.is_empty());
        assert_eq!(persisted.len() % 8, 0);
        let last: [u8; 8] = persisted[persisted.len() - 8..].try_into().unwrap();
        assert_eq!(u64::from_le_bytes(last), engine.durable_epoch());
    }

    #[test]
    fn test_run_worker_rejects_wrong_group() {
        let engine = Engine::new(
            test_config().with_workers(4).with_loggers(2),
        )
        .unwrap();
        // Worker 3 belongs to group 1, not group 0.
        assert!(matches!(
            engine.executor(3, 0),
            Err(EngineError::UnknownWorker(3))
        ));
        assert!(matches!(
            engine.executor(0, 5),
            Err(EngineError::UnknownLogger(5))
        ));
    }
}
