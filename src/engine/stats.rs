// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-worker run counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::txn::AbortReason;

/// Commit/abort accounting for one worker, readable concurrently.
///
/// `abort_count` counts every failed attempt; the per-reason counters
/// break down the validation and pipeline aborts. Operation misses
/// (not-found, duplicate insert) increment only the total.
#[derive(Default)]
pub struct WorkerStats {
    commits: AtomicU64,
    aborts: AtomicU64,
    abort_reasons: [AtomicU64; AbortReason::ALL.len()],
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self, reason: Option<AbortReason>) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = reason {
            self.abort_reasons[reason.index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    pub fn abort_reason_count(&self, reason: AbortReason) -> u64 {
        self.abort_reasons[reason.index()].load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = WorkerStats::new();
        stats.record_commit();
        stats.record_commit();
        stats.record_abort(Some(AbortReason::WriteConflict));
        stats.record_abort(Some(AbortReason::WriteConflict));
        stats.record_abort(Some(AbortReason::ReadSetChanged));
        stats.record_abort(None);

        assert_eq!(stats.commit_count(), 2);
        assert_eq!(stats.abort_count(), 4);
        assert_eq!(stats.abort_reason_count(AbortReason::WriteConflict), 2);
        assert_eq!(stats.abort_reason_count(AbortReason::ReadSetChanged), 1);
        assert_eq!(stats.abort_reason_count(AbortReason::LockedByOther), 0);
    }
}
