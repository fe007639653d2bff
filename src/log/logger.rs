// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The logger thread: group-commit flushing and durable-epoch tracking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::epoch::EpochClock;

use super::buffer::LogBuffer;
use super::error::LogError;
use super::notifier::Notifier;
use super::sink::DurableSink;

/// Flush counters for one logger, readable while the run is in flight.
#[derive(Default)]
pub struct LoggerStats {
    bytes: AtomicU64,
    records: AtomicU64,
    buffers: AtomicU64,
    syncs: AtomicU64,
}

impl LoggerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_flush(&self, records: u64, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.records.fetch_add(records, Ordering::Relaxed);
        self.buffers.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn records_flushed(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn buffers_flushed(&self) -> u64 {
        self.buffers.load(Ordering::Relaxed)
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

/// Drains filled buffers from one worker group, persists them, and
/// advances the group's durable epoch.
///
/// A transaction is durably committed once the process durable epoch
/// reaches its commit epoch; that global value is the minimum over all
/// loggers and is appended to the shared persisted-epoch stream each time
/// it advances.
pub struct Logger<S: DurableSink> {
    id: usize,
    clock: Arc<EpochClock>,
    notifier: Arc<Notifier>,
    sink: S,
    epoch_sink: Arc<Mutex<Box<dyn DurableSink>>>,
    stats: Arc<LoggerStats>,
    poll_interval: Duration,
    scratch: Vec<u8>,
}

impl<S: DurableSink> Logger<S> {
    pub fn new(
        id: usize,
        clock: Arc<EpochClock>,
        notifier: Arc<Notifier>,
        sink: S,
        epoch_sink: Arc<Mutex<Box<dyn DurableSink>>>,
        stats: Arc<LoggerStats>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            clock,
            notifier,
            sink,
            epoch_sink,
            stats,
            poll_interval,
            scratch: Vec::new(),
        }
    }

    /// Runs until `quit` is set, the group's workers have all ended, and
    /// the queue is drained.
    pub fn run(&mut self, quit: &AtomicBool) -> Result<(), LogError> {
        self.notifier.publish_logger();
        info!(logger = self.id, "logger started");

        loop {
            match self.notifier.queue().wait_dequeue(self.poll_interval) {
                Some(buffer) => {
                    self.flush_buffer(buffer)?;
                    while let Some(buffer) = self.notifier.queue().try_dequeue() {
                        self.flush_buffer(buffer)?;
                    }
                    self.sink.flush()?;
                    self.stats.record_sync();
                    self.advance_durable_epoch()?;
                }
                None => {
                    // Workers may have advanced epochs with nothing to
                    // flush; the durable epoch can still move.
                    self.advance_durable_epoch()?;
                    if quit.load(Ordering::Acquire)
                        && self.notifier.running_workers() == 0
                        && self.notifier.queue().is_empty()
                    {
                        break;
                    }
                }
            }
        }

        // Residual buffers published by workers on their way out.
        while let Some(buffer) = self.notifier.queue().try_dequeue() {
            self.flush_buffer(buffer)?;
        }
        self.sink.flush()?;
        self.stats.record_sync();
        self.advance_durable_epoch()?;

        info!(
            logger = self.id,
            bytes = self.stats.bytes_written(),
            records = self.stats.records_flushed(),
            durable_epoch = self.clock.logger_durable_epoch(self.id),
            "logger finished"
        );
        Ok(())
    }

    fn flush_buffer(&mut self, buffer: LogBuffer) -> Result<(), LogError> {
        self.scratch.clear();
        buffer.encode_into(&mut self.scratch);
        self.sink.append(&self.scratch)?;
        self.stats
            .record_flush(buffer.len() as u64, self.scratch.len() as u64);
        if let Some(slot) = self.notifier.slot(buffer.owner()) {
            slot.return_empty(buffer);
        }
        Ok(())
    }

    /// Raises this logger's durable epoch to `min(group watermarks) - 1`.
    ///
    /// Watermarks are read before the emptiness check: a worker publishes
    /// a buffer before bumping its watermark past that buffer's epoch, so
    /// any watermark this pass observes is either conservative or its
    /// buffer is already visible in the queue.
    fn advance_durable_epoch(&mut self) -> Result<(), LogError> {
        let min_watermark = self.notifier.min_watermark();
        if !self.notifier.queue().is_empty() {
            return Ok(());
        }
        let candidate = min_watermark.saturating_sub(1);
        if self.clock.raise_logger_durable_epoch(self.id, candidate) {
            debug!(
                logger = self.id,
                durable_epoch = candidate,
                "logger durable epoch advanced"
            );
            if let Some(global) = self.clock.refresh_durable_epoch() {
                let mut epoch_sink = self.epoch_sink.lock();
                epoch_sink.append(&global.to_le_bytes())?;
                epoch_sink.flush()?;
                debug!(durable_epoch = global, "process durable epoch advanced");
            }
        }
        Ok(())
    }
}
