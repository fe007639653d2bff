// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! SiloKV: an in-memory, multi-core transactional key-value engine with
//! SILO-style optimistic concurrency control and epoch-based group-commit
//! logging
//!
//! This crate provides the transaction execution engine and its coupled
//! epoch/durability protocol: per-transaction read/write-set tracking,
//! three-phase optimistic validation, the global/local epoch advancement
//! protocol, and the write-ahead-log pipeline that ties commit order to
//! durable storage.

pub mod engine;
pub mod epoch;
pub mod log;
pub mod storage;
pub mod txn;
pub mod workload;

pub use engine::{DurabilityMode, Engine, EngineConfig, EngineError, LoggerAffinity, WorkerStats};
pub use epoch::{EpochClock, INITIAL_EPOCH};
pub use log::{
    DurableSink, FileSink, LogBuffer, LogBufferPool, LogError, Logger, LoggerStats, MemorySink,
    NotificationId, Notifier,
};
pub use storage::{
    Index, Key, Record, ShardedHashIndex, StorageError, StorageId, Value, VersionWord,
};
pub use txn::{AbortReason, TxExecutor, TxStatus, TxnError};
pub use workload::{Op, Procedure, UniformWorkload, Workload};
