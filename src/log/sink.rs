// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Durable sink trait and implementations.
//!
//! A sink is the "append bytes to durable storage" capability a logger
//! consumes. [`FileSink`] is the persistent implementation; [`MemorySink`]
//! backs tests and benchmarks.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

/// An append-only durable byte stream.
///
/// `flush` must be an fsync-equivalent: once it returns, every previously
/// appended byte survives a crash. Loggers only advance durable epochs
/// after a successful flush.
pub trait DurableSink: Send {
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    fn flush(&mut self) -> std::io::Result<()>;
}

/// Append-only file sink backed by `fdatasync`.
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Opens (creating if necessary) an append-only file at `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl DurableSink for FileSink {
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.sync_data()
    }
}

/// In-memory sink. Clones share the same buffer, so a test can keep a
/// handle while the logger owns another.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    bytes: Vec<u8>,
    syncs: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of completed flushes.
    pub fn sync_count(&self) -> u64 {
        self.inner.lock().syncs
    }
}

impl DurableSink for MemorySink {
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.lock().bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.lock().syncs += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_appends_and_syncs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log0.dat");

        let mut sink = FileSink::create(&path).unwrap();
        sink.append(b"hello ").unwrap();
        sink.append(b"world").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        // Reopening keeps appending, never truncates.
        let mut sink = FileSink::create(&path).unwrap();
        sink.append(b"!").unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world!");
    }

    #[test]
    fn test_memory_sink_shares_bytes_across_clones() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.append(&[1, 2, 3]).unwrap();
        writer.flush().unwrap();

        assert_eq!(sink.bytes(), vec![1, 2, 3]);
        assert_eq!(sink.sync_count(), 1);
    }
}
