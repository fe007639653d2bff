// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Write-ahead logging and group commit.
//!
//! Commits reach durability in three stages. A committing worker appends
//! its write set to a per-worker [`LogBuffer`] before any record mutation
//! becomes visible. Buffers rotate on epoch boundaries through a
//! [`LogBufferPool`] into the group's queue. A [`Logger`] thread drains
//! the queue, persists whole records to a [`DurableSink`], and advances
//! its durable epoch; the process durable epoch is the minimum over all
//! loggers, and a transaction is durably committed once it reaches the
//! transaction's commit epoch.
//!
//! Workers and loggers rendezvous through a per-logger [`Notifier`]:
//! registration, logger discovery, flush watermarks, and shutdown
//! accounting all pass through it.

mod buffer;
mod error;
mod logger;
mod notifier;
mod sink;

pub use buffer::{LogBuffer, LogBufferPool, LogEntry, LogQueue, LogRecord, NotificationId};
pub use error::LogError;
pub use logger::{Logger, LoggerStats};
pub use notifier::{Notifier, WorkerSlot};
pub use sink::{DurableSink, FileSink, MemorySink};
