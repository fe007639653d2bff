// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Worker/logger rendezvous.
//!
//! One [`Notifier`] exists per logger. Workers in the logger's affinity
//! group register through it to obtain their buffer pool, then spin (with
//! epoch work interleaved) until the logger publishes itself. The logger
//! reads the group's flush watermarks through it to decide how far the
//! durable epoch may advance, and watches the running-worker count to know
//! when it can retire.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::{LogBuffer, LogBufferPool, LogQueue};

/// Per-worker state shared between the worker and its logger: the free
/// buffer list and the flush watermark.
pub struct WorkerSlot {
    worker_id: usize,
    /// Smallest epoch that could still produce an unflushed record from
    /// this worker.
    watermark: AtomicU64,
    empties: Mutex<Vec<LogBuffer>>,
}

impl WorkerSlot {
    pub(crate) fn new(worker_id: usize, buffers: usize, capacity: usize) -> Self {
        Self {
            worker_id,
            watermark: AtomicU64::new(0),
            empties: Mutex::new(
                (0..buffers)
                    .map(|_| LogBuffer::new(worker_id, capacity))
                    .collect(),
            ),
        }
    }

    #[inline]
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn take_empty(&self) -> Option<LogBuffer> {
        self.empties.lock().pop()
    }

    /// Returns a drained buffer to the free list.
    pub fn return_empty(&self, mut buffer: LogBuffer) {
        buffer.reset();
        self.empties.lock().push(buffer);
    }

    #[inline]
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn store_watermark(&self, epoch: u64) {
        self.watermark.store(epoch, Ordering::Release);
    }
}

/// Registration and signaling hub for one logger and its worker group.
pub struct Notifier {
    queue: Arc<LogQueue>,
    slots: Vec<Arc<WorkerSlot>>,
    logger_ready: AtomicBool,
    running_workers: AtomicUsize,
}

impl Notifier {
    /// Creates the hub for the given worker ids, provisioning each worker
    /// `buffers` buffers of `capacity` records.
    pub fn new(worker_ids: &[usize], buffers: usize, capacity: usize) -> Self {
        Self {
            queue: Arc::new(LogQueue::new()),
            slots: worker_ids
                .iter()
                .map(|&w| Arc::new(WorkerSlot::new(w, buffers, capacity)))
                .collect(),
            logger_ready: AtomicBool::new(false),
            running_workers: AtomicUsize::new(0),
        }
    }

    /// Registers a worker and hands it its buffer pool. Returns `None` for
    /// a worker outside this logger's group.
    pub fn register(&self, worker_id: usize) -> Option<LogBufferPool> {
        let slot = self.slot(worker_id)?;
        self.running_workers.fetch_add(1, Ordering::AcqRel);
        Some(LogBufferPool::new(
            Arc::clone(slot),
            Arc::clone(&self.queue),
        ))
    }

    /// Marks one registered worker as finished.
    pub fn worker_end(&self) {
        self.running_workers.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn running_workers(&self) -> usize {
        self.running_workers.load(Ordering::Acquire)
    }

    /// Called by the logger once it is servicing the queue.
    pub fn publish_logger(&self) {
        self.logger_ready.store(true, Ordering::Release);
    }

    #[inline]
    pub fn logger_published(&self) -> bool {
        self.logger_ready.load(Ordering::Acquire)
    }

    #[inline]
    pub fn queue(&self) -> &Arc<LogQueue> {
        &self.queue
    }

    pub fn slot(&self, worker_id: usize) -> Option<&Arc<WorkerSlot>> {
        self.slots.iter().find(|s| s.worker_id() == worker_id)
    }

    /// Minimum flush watermark across the group. Gates durable-epoch
    /// advancement; must be read before checking the queue for emptiness.
    pub fn min_watermark(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.watermark())
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_end() {
        let notifier = Notifier::new(&[0, 3], 2, 8);
        assert_eq!(notifier.running_workers(), 0);

        let pool = notifier.register(3);
        assert!(pool.is_some());
        assert_eq!(notifier.running_workers(), 1);

        assert!(notifier.register(1).is_none());
        assert_eq!(notifier.running_workers(), 1);

        notifier.worker_end();
        assert_eq!(notifier.running_workers(), 0);
    }

    #[test]
    fn test_logger_publication() {
        let notifier = Notifier::new(&[0], 2, 8);
        assert!(!notifier.logger_published());
        notifier.publish_logger();
        assert!(notifier.logger_published());
    }

    #[test]
    fn test_min_watermark() {
        let notifier = Notifier::new(&[0, 1], 2, 8);
        notifier.slot(0).unwrap().store_watermark(5);
        notifier.slot(1).unwrap().store_watermark(3);
        assert_eq!(notifier.min_watermark(), 3);
    }
}
