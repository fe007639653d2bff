// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The per-worker transaction executor.
//!
//! One `TxExecutor` exists per worker thread. It owns the transaction's
//! read and write sets and runs the whole lifecycle: optimistic reads,
//! buffered writes, the three-phase validation that gates commit, the
//! write phase that publishes mutations, and the epoch/durable-epoch work
//! a worker performs between transactions.

use std::sync::atomic::{compiler_fence, AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::epoch::EpochClock;
use crate::log::{LogBufferPool, LogEntry, NotificationId};
use crate::storage::{Index, Key, Record, StorageId, Value, VersionWord};

use super::element::{ReadElement, WriteElement, WriteKind};
use super::error::{AbortReason, TxnError};

/// Per-attempt transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Between `begin()` and the commit/abort decision.
    InFlight,
    /// Passed validation and ran the write phase. Terminal.
    Committed,
    /// Failed validation or was explicitly aborted. Terminal for this
    /// attempt; the workload loop retries with a fresh `begin()`.
    Aborted,
}

/// Pause between epoch-work polls while a worker is waiting on the log
/// pipeline.
const EPOCH_WORK_PAUSE: Duration = Duration::from_micros(1);

pub struct TxExecutor<I: Index> {
    worker_id: usize,
    logger_id: usize,
    status: TxStatus,
    read_set: Vec<ReadElement>,
    write_set: Vec<WriteElement>,
    /// Largest version word observed across the read set (validation).
    max_rset: VersionWord,
    /// Largest pre-lock version word across the write set (phase 1).
    max_wset: VersionWord,
    /// Most recently chosen commit word; keeps this worker's commit ids
    /// monotonic across epochs.
    most_recent_tid: VersionWord,
    nid: NotificationId,
    nid_seq: u64,
    clock: Arc<EpochClock>,
    index: Arc<I>,
    pool: LogBufferPool,
    epoch_diff: u64,
    epoch_timer: Instant,
    started_at: Instant,
}

impl<I: Index> TxExecutor<I> {
    pub fn new(
        worker_id: usize,
        logger_id: usize,
        clock: Arc<EpochClock>,
        index: Arc<I>,
        pool: LogBufferPool,
        epoch_diff: u64,
    ) -> Self {
        Self {
            worker_id,
            logger_id,
            status: TxStatus::InFlight,
            read_set: Vec::new(),
            write_set: Vec::new(),
            max_rset: VersionWord::from_raw(0),
            max_wset: VersionWord::from_raw(0),
            most_recent_tid: VersionWord::from_raw(0),
            nid: NotificationId::default(),
            nid_seq: 0,
            clock,
            index,
            pool,
            epoch_diff,
            epoch_timer: Instant::now(),
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    #[inline]
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Worker 0 carries leader duty.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.worker_id == 0
    }

    /// Commit word of this worker's most recent commit.
    #[inline]
    pub fn last_commit_word(&self) -> VersionWord {
        self.most_recent_tid
    }

    #[inline]
    pub fn read_set_len(&self) -> usize {
        self.read_set.len()
    }

    #[inline]
    pub fn write_set_len(&self) -> usize {
        self.write_set.len()
    }

    /// Starts a new transaction attempt.
    pub fn begin(&mut self) {
        self.status = TxStatus::InFlight;
        self.max_rset = VersionWord::from_raw(0);
        self.max_wset = VersionWord::from_raw(0);
        self.nid = NotificationId::new(
            self.nid_seq,
            self.worker_id as u32,
            self.started_at.elapsed().as_nanos() as u64,
        );
        self.nid_seq += 1;
    }

    /// Clears both operation sets without touching any record state.
    /// Inserted placeholder records stay in the index, still absent.
    pub fn abort(&mut self) {
        self.read_set.clear();
        self.write_set.clear();
        self.status = TxStatus::Aborted;
    }

    /// Reads `key`, preferring this transaction's own prior reads and
    /// writes over the index (read-your-own-writes).
    pub fn read(&mut self, table: StorageId, key: Key) -> Result<Value, TxnError> {
        if let Some(element) = self.search_read_set(table, key) {
            return Ok(element.value);
        }
        if let Some(element) = self.search_write_set(table, key) {
            return Ok(element.value);
        }

        let record = self.index.get(table, key).ok_or(TxnError::NotFound)?;
        let (value, word) = Self::read_internal(&record)?;
        self.read_set.push(ReadElement {
            table,
            key,
            record,
            value,
            word,
        });
        Ok(value)
    }

    /// The optimistic read protocol: copy the payload between two
    /// acquire-loads of the version word and retry until they agree, so
    /// the returned pair is a consistent snapshot. Never blocks writers;
    /// the cost is re-validation at commit time.
    fn read_internal(record: &Record) -> Result<(Value, VersionWord), TxnError> {
        let mut expected = record.version();
        loop {
            while expected.is_locked() {
                std::hint::spin_loop();
                expected = record.version();
            }
            if expected.is_absent() {
                return Err(TxnError::NotFound);
            }
            let value = record.payload();
            let check = record.version();
            if expected == check {
                return Ok((value, expected));
            }
            expected = check;
        }
    }

    /// Buffers an update of `key`. The record itself is untouched until
    /// the write phase.
    pub fn write(&mut self, table: StorageId, key: Key, value: Value) -> Result<(), TxnError> {
        if let Some(element) = self.search_write_set_mut(table, key) {
            element.value = value;
            return Ok(());
        }

        // A handle from a prior read in this transaction saves the index
        // lookup.
        let record = if let Some(element) = self.search_read_set(table, key) {
            Arc::clone(&element.record)
        } else {
            self.index.get(table, key).ok_or(TxnError::NotFound)?
        };
        self.write_set.push(WriteElement {
            table,
            key,
            record,
            value,
            kind: WriteKind::Update,
        });
        Ok(())
    }

    /// Inserts a new key. The record enters the index immediately as an
    /// absent placeholder; other transactions cannot see it until this
    /// one's write phase clears the absent bit.
    pub fn insert(&mut self, table: StorageId, key: Key, value: Value) -> Result<(), TxnError> {
        if self.search_write_set(table, key).is_some() {
            return Err(TxnError::AlreadyExists);
        }
        // Any index entry conflicts, absent placeholders included.
        if self.index.get(table, key).is_some() {
            return Err(TxnError::AlreadyExists);
        }

        let record = Arc::new(Record::new_absent(value));
        if let Err(err) = self.index.insert(table, key, Arc::clone(&record)) {
            return Err(match err {
                crate::storage::StorageError::AlreadyExists => TxnError::AlreadyExists,
                _ => TxnError::NotFound,
            });
        }
        self.write_set.push(WriteElement {
            table,
            key,
            record,
            value,
            kind: WriteKind::Insert,
        });
        Ok(())
    }

    /// Validates and, on success, runs the write phase.
    pub fn commit(&mut self) -> Result<(), TxnError> {
        match self.validation_phase() {
            Ok(()) => self.write_phase(),
            Err(reason) => Err(TxnError::Aborted(reason)),
        }
    }

    /// The three-phase commit gate.
    fn validation_phase(&mut self) -> Result<(), AbortReason> {
        // Phase 1: lock the write set in storage-qualified key order. The
        // global order makes lock acquisition deadlock-free.
        self.write_set
            .sort_unstable_by_key(|element| (element.table, element.key));
        self.lock_write_set()?;

        // Publish this worker's epoch observation so the leader cannot
        // advance the global epoch past a mid-validation transaction.
        compiler_fence(Ordering::SeqCst);
        self.clock.publish_worker_epoch(self.worker_id);
        compiler_fence(Ordering::SeqCst);

        // Phase 2: re-validate every read against the current version
        // words.
        for i in 0..self.read_set.len() {
            let observed = self.read_set[i].word;
            let check = self.read_set[i].record.version();
            if check.tid() != observed.tid() || check.epoch() != observed.epoch() {
                self.unlock_write_set(self.write_set.len());
                self.status = TxStatus::Aborted;
                return Err(AbortReason::ReadSetChanged);
            }
            if check.is_locked() {
                let (table, key) = (self.read_set[i].table, self.read_set[i].key);
                if self.search_write_set(table, key).is_none() {
                    self.unlock_write_set(self.write_set.len());
                    self.status = TxStatus::Aborted;
                    return Err(AbortReason::LockedByOther);
                }
            }
            self.max_rset = self.max_rset.max(check);
        }

        // Phase 3: the commit id is computed in the write phase.
        self.status = TxStatus::Committed;
        Ok(())
    }

    /// Locks every non-insert write-set record, aborting on the first
    /// contended lock (no-wait policy).
    fn lock_write_set(&mut self) -> Result<(), AbortReason> {
        for i in 0..self.write_set.len() {
            if self.write_set[i].kind == WriteKind::Insert {
                continue;
            }
            let mut expected = self.write_set[i].record.version();
            loop {
                if expected.is_locked() {
                    self.unlock_write_set(i);
                    self.status = TxStatus::Aborted;
                    return Err(AbortReason::WriteConflict);
                }
                match self.write_set[i]
                    .record
                    .compare_and_swap(expected, expected.with_locked(true))
                {
                    Ok(()) => break,
                    Err(actual) => expected = actual,
                }
            }
            self.max_wset = self.max_wset.max(expected);
        }
        Ok(())
    }

    /// Releases the locks of the first `upto` write-set elements.
    fn unlock_write_set(&self, upto: usize) {
        for element in &self.write_set[..upto] {
            if element.kind == WriteKind::Insert {
                continue;
            }
            let word = element.record.version();
            element.record.set_version(word.with_locked(false));
        }
    }

    /// Applies the write set and releases locks by storing the commit
    /// word. The log append comes first: a mutation never becomes visible
    /// before its log record exists.
    fn write_phase(&mut self) -> Result<(), TxnError> {
        // The commit word is the maximum of three candidates: one past the
        // largest version read or written, one past this worker's previous
        // commit, and the current local epoch.
        let tid_a = self.max_rset.max(self.max_wset).bump_tid();
        let tid_b = self.most_recent_tid.bump_tid();
        let tid_c = VersionWord::new().with_epoch(self.clock.worker_epoch(self.worker_id));
        let commit = tid_a
            .max(tid_b)
            .max(tid_c)
            .with_locked(false)
            .with_latest(true)
            .with_absent(false);
        self.most_recent_tid = commit;

        self.wal(commit)?;

        for element in &self.write_set {
            // Updates release their lock here; inserts become visible here
            // (they were never locked, being invisible until now).
            element.record.set_payload(element.value);
            element.record.set_version(commit);
        }

        self.read_set.clear();
        self.write_set.clear();
        Ok(())
    }

    /// Appends the write set to the log buffer, flagging the buffer
    /// rotation when this commit opens a new epoch for the worker.
    fn wal(&mut self, commit: VersionWord) -> Result<(), TxnError> {
        let previous = VersionWord::from_raw(self.clock.commit_watermark(self.worker_id));
        let epoch_boundary = previous.epoch() != commit.epoch();
        let entries: Vec<LogEntry> = self
            .write_set
            .iter()
            .map(|element| LogEntry {
                table: element.table,
                key: element.key,
                value: element.value,
            })
            .collect();
        self.pool
            .push(commit, self.nid, entries, epoch_boundary)
            .map_err(|_| TxnError::BufferExhaustion)?;
        if epoch_boundary {
            self.clock.set_commit_watermark(self.worker_id, commit.raw());
        }
        Ok(())
    }

    /// Leader duty: advance the global epoch if due.
    pub fn leader_work(&mut self) {
        self.clock.leader_work(&mut self.epoch_timer);
    }

    /// Between-transaction epoch maintenance: refresh this worker's local
    /// epoch (and commit watermark on a boundary), and keep the flush
    /// watermark current.
    pub fn epoch_work(&mut self) {
        spin_for(EPOCH_WORK_PAUSE);
        if self.is_leader() {
            self.leader_work();
        }
        let old = VersionWord::from_raw(self.clock.commit_watermark(self.worker_id));
        let epoch = self.clock.publish_worker_epoch(self.worker_id);
        if old.epoch() != epoch {
            let word = VersionWord::new().with_epoch(epoch);
            self.clock.set_commit_watermark(self.worker_id, word.raw());
        }
        self.pool.update_watermark(epoch);
    }

    /// True while this worker has run more than `epoch_diff` epochs ahead
    /// of its logger's durable epoch.
    fn pause_condition(&self) -> bool {
        let durable = self.clock.logger_durable_epoch(self.logger_id);
        self.clock.worker_epoch(self.worker_id) > durable + self.epoch_diff
    }

    /// Pre-transaction gate on the log pipeline: applies durable-epoch
    /// backpressure, then waits (doing epoch work) until a log buffer is
    /// available. Returning `Ok` with `quit` unset guarantees a current
    /// buffer for the next commit.
    pub fn durable_epoch_work(&mut self, quit: &AtomicBool) -> Result<(), TxnError> {
        if self.epoch_diff > 0 && self.pause_condition() {
            // Hand the logger everything pending, then idle on epoch work
            // until the durable epoch catches up.
            self.pool.publish();
            loop {
                self.epoch_work();
                if quit.load(Ordering::Acquire) {
                    return Ok(());
                }
                if !self.pause_condition() {
                    break;
                }
            }
        }

        while !self.pool.is_ready() {
            self.epoch_work();
            if quit.load(Ordering::Acquire) {
                return Ok(());
            }
        }
        if !self.pool.has_current() {
            return Err(TxnError::BufferExhaustion);
        }
        Ok(())
    }

    /// End-of-run cleanup: hand the logger the partially filled current
    /// buffer so the final group commit covers every commit.
    pub fn finish(&mut self) {
        self.pool.publish();
    }
}

fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

impl<I: Index> TxExecutor<I> {
    fn search_read_set(&self, table: StorageId, key: Key) -> Option<&ReadElement> {
        self.read_set
            .iter()
            .find(|e| e.table == table && e.key == key)
    }

    fn search_write_set(&self, table: StorageId, key: Key) -> Option<&WriteElement> {
        self.write_set
            .iter()
            .find(|e| e.table == table && e.key == key)
    }

    fn search_write_set_mut(&mut self, table: StorageId, key: Key) -> Option<&mut WriteElement> {
        self.write_set
            .iter_mut()
            .find(|e| e.table == table && e.key == key)
    }
}
