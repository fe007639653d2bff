// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::error::EngineError;

/// Where log sinks live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Append-only files under `log_dir`, fsynced per group commit.
    File,
    /// In-memory sinks; for tests and benchmarks.
    Memory,
}

/// Configuration for engine construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of worker threads (worker 0 is the epoch leader).
    pub workers: usize,
    /// Number of logger threads; workers are grouped onto them round-robin.
    pub loggers: usize,
    /// Number of tables in the store.
    pub tables: usize,
    /// Keys `0..records_per_table` pre-populated into each table.
    pub records_per_table: u64,
    /// Minimum time between global epoch advances.
    pub epoch_interval: Duration,
    /// Backpressure bound: a worker pauses once its local epoch exceeds
    /// its logger's durable epoch by more than this. Zero disables the
    /// pause.
    pub epoch_diff: u64,
    /// Log buffers per worker.
    pub buffers_per_worker: usize,
    /// Log records per buffer.
    pub buffer_capacity: usize,
    /// Directory for `log<N>.dat` and `durable_epoch.dat` in file mode.
    pub log_dir: PathBuf,
    pub durability: DurabilityMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            loggers: 1,
            tables: 1,
            records_per_table: 100_000,
            epoch_interval: Duration::from_millis(40),
            epoch_diff: 0,
            buffers_per_worker: 8,
            buffer_capacity: 1000,
            log_dir: PathBuf::from("silokv-log"),
            durability: DurabilityMode::File,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_loggers(mut self, loggers: usize) -> Self {
        self.loggers = loggers;
        self
    }

    pub fn with_tables(mut self, tables: usize) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_records_per_table(mut self, records: u64) -> Self {
        self.records_per_table = records;
        self
    }

    pub fn with_epoch_interval(mut self, interval: Duration) -> Self {
        self.epoch_interval = interval;
        self
    }

    pub fn with_epoch_diff(mut self, diff: u64) -> Self {
        self.epoch_diff = diff;
        self
    }

    pub fn with_buffers_per_worker(mut self, buffers: usize) -> Self {
        self.buffers_per_worker = buffers;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }
        if self.loggers == 0 || self.loggers > self.workers {
            return Err(EngineError::Config(
                "loggers must be between 1 and the worker count".into(),
            ));
        }
        if self.tables == 0 {
            return Err(EngineError::Config("tables must be at least 1".into()));
        }
        if self.buffers_per_worker < 2 {
            return Err(EngineError::Config(
                "buffers_per_worker must be at least 2 for rotation".into(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(EngineError::Config(
                "buffer_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(EngineConfig::default().with_workers(0).validate().is_err());
        assert!(EngineConfig::default()
            .with_workers(2)
            .with_loggers(3)
            .validate()
            .is_err());
        assert!(EngineConfig::default().with_tables(0).validate().is_err());
        assert!(EngineConfig::default()
            .with_buffers_per_worker(1)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_buffer_capacity(0)
            .validate()
            .is_err());
    }
}
