// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.
//!
//! Everything here except buffer exhaustion is an expected, frequent
//! outcome recovered by the workload loop with a fresh `begin()`; none of
//! it escapes the execution boundary. Buffer exhaustion signals a pool
//! sizing bug and terminates the worker instead of being retried.

/// Why a transaction failed validation (or the pipeline beneath it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AbortReason {
    /// Phase 1: another committer already holds a write lock (no-wait
    /// policy, first contended lock aborts).
    #[error("write-write conflict during lock acquisition")]
    WriteConflict,

    /// Phase 2: a read record's version changed since the read phase.
    #[error("read set changed since read phase")]
    ReadSetChanged,

    /// Phase 2: a read record is locked by a transaction other than this
    /// one.
    #[error("record locked by another transaction")]
    LockedByOther,

    /// The log buffer pool had no current buffer when one was required.
    #[error("no current log buffer")]
    BufferExhaustion,
}

impl AbortReason {
    pub const ALL: [AbortReason; 4] = [
        AbortReason::WriteConflict,
        AbortReason::ReadSetChanged,
        AbortReason::LockedByOther,
        AbortReason::BufferExhaustion,
    ];

    /// Dense index for per-reason counters.
    pub fn index(self) -> usize {
        match self {
            AbortReason::WriteConflict => 0,
            AbortReason::ReadSetChanged => 1,
            AbortReason::LockedByOther => 2,
            AbortReason::BufferExhaustion => 3,
        }
    }
}

/// Errors surfaced by transaction operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TxnError {
    /// Key absent from the index, or present only as an uncommitted
    /// placeholder.
    #[error("key not found")]
    NotFound,

    /// Duplicate insert, within this transaction or against the index.
    #[error("key already exists")]
    AlreadyExists,

    /// Commit failed validation; the caller clears state and retries.
    #[error("transaction aborted: {0}")]
    Aborted(AbortReason),

    /// Fatal: the log pipeline ran out of buffers. Not retryable.
    #[error("log buffer pool exhausted")]
    BufferExhaustion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_indices_are_dense() {
        for (i, reason) in AbortReason::ALL.iter().enumerate() {
            assert_eq!(reason.index(), i);
        }
    }
}
