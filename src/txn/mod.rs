// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Optimistic transaction execution in the SILO style.
//!
//! Transactions run entirely without locks, tracking what they read and
//! buffering what they write, then pass a three-phase commit gate:
//!
//! 1. **Lock** the write set in a global key order, aborting on the first
//!    contended lock (no-wait: contention costs an abort, never a stall).
//! 2. **Validate** the read set: every observed version word must be
//!    unchanged and unlocked by others.
//! 3. **Commit**: choose a commit version word above everything read or
//!    written, append the write set to the log, then publish the
//!    mutations by releasing each record with the commit word.
//!
//! # Key Concepts
//!
//! ## Optimistic reads
//!
//! A read copies the payload between two acquire-loads of the record's
//! version word and retries until the loads agree. Readers never block
//! writers and take no locks; stale reads are caught at validation.
//!
//! ## Read-your-own-writes
//!
//! Within one transaction, reads are served from the transaction's own
//! read and write sets before the index is consulted, so a transaction
//! always sees its own uncommitted effects.
//!
//! ## Retry ownership
//!
//! `Aborted` is terminal for an attempt, not an error to propagate: the
//! workload loop clears state with [`TxExecutor::abort`] and retries with
//! a fresh [`TxExecutor::begin`]. Only log-pipeline exhaustion escapes,
//! and it terminates the worker.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//! use silokv::epoch::EpochClock;
//! use silokv::log::Notifier;
//! use silokv::storage::{Key, ShardedHashIndex, StorageId, Value};
//! use silokv::txn::{TxExecutor, TxnError};
//!
//! let clock = Arc::new(EpochClock::new(1, 1, Duration::from_millis(40)));
//! let index = Arc::new(ShardedHashIndex::new(1));
//! let notifier = Notifier::new(&[0], 8, 1000);
//! let pool = notifier.register(0).unwrap();
//!
//! let mut tx = TxExecutor::new(0, 0, clock, index, pool, 0);
//! let quit = AtomicBool::new(false);
//!
//! tx.durable_epoch_work(&quit)?;
//! tx.begin();
//! tx.insert(StorageId(0), Key(1), Value::from(10u64))?;
//! tx.commit()?;
//! # Ok::<(), TxnError>(())
//! ```

mod element;
mod error;
mod executor;

pub use element::{ReadElement, WriteElement, WriteKind};
pub use error::{AbortReason, TxnError};
pub use executor::{TxExecutor, TxStatus};
