// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Log records, per-worker log buffers, and the buffer pool.
//!
//! Every committed transaction appends exactly one [`LogRecord`] to its
//! worker's current [`LogBuffer`] before any in-memory record becomes
//! visible (write-ahead ordering). Buffers rotate through a fixed pool:
//!
//! ```text
//! empty (worker slot) -> filling (current) -> queued -> flushing (logger) -> empty
//! ```
//!
//! A buffer is published to the logger's queue when the committing epoch
//! changes or the buffer fills, so each flush carries a complete epoch's
//! worth of records from that worker (group commit). Ownership moves with
//! the buffer value; no committed record is ever dropped by rotation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::storage::{Key, StorageId, Value, VersionWord};

use super::error::LogError;
use super::notifier::WorkerSlot;

/// Per-transaction notification token carried in every log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationId {
    /// Per-worker sequence number, assigned at `begin()`.
    pub seq: u64,
    /// Worker that ran the transaction.
    pub worker: u32,
    /// Monotonic timestamp (nanoseconds since engine start) of `begin()`.
    pub at_nanos: u64,
}

impl NotificationId {
    pub fn new(seq: u64, worker: u32, at_nanos: u64) -> Self {
        Self {
            seq,
            worker,
            at_nanos,
        }
    }
}

/// One mutated key in a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub table: StorageId,
    pub key: Key,
    pub value: Value,
}

/// The durable image of one committed transaction: its commit version
/// word, notification id, and full write set. Immutable once pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub tid: u64,
    pub nid: NotificationId,
    pub entries: Vec<LogEntry>,
}

impl LogRecord {
    /// Commit epoch, unpacked from the version word.
    #[inline]
    pub fn epoch(&self) -> u64 {
        VersionWord::from_raw(self.tid).epoch()
    }

    /// Serialized length in bytes.
    pub fn encoded_len(&self) -> usize {
        8 + 8 + 4 + 4 + self.entries.len() * (4 + 8 + 8)
    }

    /// Appends the fixed-width little-endian encoding:
    /// `tid u64 | nid.seq u64 | nid.worker u32 | entry count u32`
    /// followed by `table u32 | key u64 | value [u8; 8]` per entry.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tid.to_le_bytes());
        out.extend_from_slice(&self.nid.seq.to_le_bytes());
        out.extend_from_slice(&self.nid.worker.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.table.0.to_le_bytes());
            out.extend_from_slice(&entry.key.0.to_le_bytes());
            out.extend_from_slice(entry.value.as_bytes());
        }
    }
}

/// Fixed-capacity append-only accumulator of log records, tagged with the
/// epoch range it covers.
pub struct LogBuffer {
    owner: usize,
    records: Vec<LogRecord>,
    capacity: usize,
    min_epoch: u64,
    max_epoch: u64,
}

impl LogBuffer {
    pub(crate) fn new(owner: usize, capacity: usize) -> Self {
        Self {
            owner,
            records: Vec::with_capacity(capacity),
            capacity,
            min_epoch: 0,
            max_epoch: 0,
        }
    }

    /// Worker this buffer belongs to; the logger returns it there.
    #[inline]
    pub fn owner(&self) -> usize {
        self.owner
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Smallest commit epoch of any record held (0 when empty).
    #[inline]
    pub fn min_epoch(&self) -> u64 {
        self.min_epoch
    }

    #[inline]
    pub fn max_epoch(&self) -> u64 {
        self.max_epoch
    }

    fn push(&mut self, record: LogRecord) {
        let epoch = record.epoch();
        if self.records.is_empty() {
            self.min_epoch = epoch;
            self.max_epoch = epoch;
        } else {
            self.min_epoch = self.min_epoch.min(epoch);
            self.max_epoch = self.max_epoch.max(epoch);
        }
        self.records.push(record);
    }

    pub(crate) fn reset(&mut self) {
        self.records.clear();
        self.min_epoch = 0;
        self.max_epoch = 0;
    }

    /// Appends the buffer header and every record, whole records only:
    /// `record count u32 | min epoch u64 | max epoch u64 | records...`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.min_epoch.to_le_bytes());
        out.extend_from_slice(&self.max_epoch.to_le_bytes());
        for record in &self.records {
            record.encode_into(out);
        }
    }

    /// Serialized length of the buffer, header included.
    pub fn encoded_len(&self) -> usize {
        4 + 8 + 8 + self.records.iter().map(LogRecord::encoded_len).sum::<usize>()
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[LogRecord] {
        &self.records
    }
}

/// Queue of filled buffers from a logger's worker group, drained by that
/// logger. The condvar lets the logger sleep between group commits instead
/// of spinning.
pub struct LogQueue {
    inner: Mutex<VecDeque<LogBuffer>>,
    ready: Condvar,
}

impl LogQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub fn enqueue(&self, buffer: LogBuffer) {
        self.inner.lock().push_back(buffer);
        self.ready.notify_one();
    }

    pub fn try_dequeue(&self) -> Option<LogBuffer> {
        self.inner.lock().pop_front()
    }

    /// Blocks up to `timeout` for a buffer.
    pub fn wait_dequeue(&self, timeout: Duration) -> Option<LogBuffer> {
        let mut queue = self.inner.lock();
        if queue.is_empty() {
            self.ready.wait_for(&mut queue, timeout);
        }
        queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker rotating buffer pool.
///
/// Exactly one buffer is "current" at a time; `push` appends to it and
/// rotates on epoch boundaries and capacity. The worker must confirm
/// `is_ready()` before starting a transaction; `push` with no current
/// buffer is the fatal pool-exhaustion invariant, not a transient state.
pub struct LogBufferPool {
    slot: Arc<WorkerSlot>,
    queue: Arc<LogQueue>,
    current: Option<LogBuffer>,
}

impl LogBufferPool {
    pub(crate) fn new(slot: Arc<WorkerSlot>, queue: Arc<LogQueue>) -> Self {
        let current = slot.take_empty();
        Self {
            slot,
            queue,
            current,
        }
    }

    /// Appends one committed transaction to the current buffer.
    ///
    /// `epoch_boundary` marks that the commit's epoch differs from the
    /// worker's previous commit; the old buffer is published first so each
    /// flush holds a single epoch's records.
    pub fn push(
        &mut self,
        commit: VersionWord,
        nid: NotificationId,
        entries: Vec<LogEntry>,
        epoch_boundary: bool,
    ) -> Result<(), LogError> {
        if self.current.is_none() {
            return Err(LogError::BufferExhausted);
        }
        // Rotate on the caller's boundary flag, and also whenever the
        // pending records are from an older epoch than this commit (epoch
        // work may have refreshed the commit watermark with no commit in
        // between, hiding the boundary from the caller).
        let rotate = self
            .current
            .as_ref()
            .is_some_and(|b| !b.is_empty() && (epoch_boundary || b.max_epoch() != commit.epoch()));
        if rotate {
            self.publish();
        }
        let Some(buffer) = self.current.as_mut() else {
            // Rotation found no spare buffer while a record must be logged.
            return Err(LogError::BufferExhausted);
        };
        buffer.push(LogRecord {
            tid: commit.raw(),
            nid,
            entries,
        });
        self.slot.store_watermark(buffer.min_epoch());
        if buffer.is_full() {
            self.publish();
        }
        Ok(())
    }

    /// Hands the current buffer to the logger if it holds anything, and
    /// tries to install a fresh one from the free list.
    pub fn publish(&mut self) {
        match self.current.take() {
            Some(buffer) if !buffer.is_empty() => {
                self.queue.enqueue(buffer);
                self.current = self.slot.take_empty();
            }
            other => self.current = other,
        }
    }

    /// True when a current buffer is installed, refilling from the free
    /// list if needed. Workers must not start a transaction while false.
    pub fn is_ready(&mut self) -> bool {
        if self.current.is_none() {
            self.current = self.slot.take_empty();
        }
        self.current.is_some()
    }

    #[inline]
    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Refreshes this worker's flush watermark: the smallest epoch that
    /// could still produce an unflushed record from it. With pending
    /// records that is the buffer's minimum epoch; otherwise the caller's
    /// current local epoch.
    pub fn update_watermark(&self, fallback_epoch: u64) {
        let watermark = match &self.current {
            Some(buffer) if !buffer.is_empty() => buffer.min_epoch(),
            _ => fallback_epoch,
        };
        self.slot.store_watermark(watermark);
    }
}
