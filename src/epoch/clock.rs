// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The process-wide epoch clock and the leader advancement protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Epoch the global clock starts at and records are initialized with.
pub const INITIAL_EPOCH: u64 = 1;

/// Process-wide epoch state, shared by reference with every worker and
/// logger. Mutated only via atomic operations; never locked.
pub struct EpochClock {
    global: AtomicU64,
    /// Each worker's last-observed global epoch.
    worker_epochs: Box<[AtomicU64]>,
    /// Highest commit version word each worker has produced (raw).
    commit_watermarks: Box<[AtomicU64]>,
    /// Per-logger durable epochs.
    logger_epochs: Box<[AtomicU64]>,
    /// Process durable epoch: min over all loggers, monotone.
    durable: AtomicU64,
    interval: Duration,
}

impl EpochClock {
    /// Creates a clock for `workers` workers and `loggers` loggers, with
    /// the leader advancing the global epoch at most once per `interval`.
    pub fn new(workers: usize, loggers: usize, interval: Duration) -> Self {
        Self {
            global: AtomicU64::new(INITIAL_EPOCH),
            worker_epochs: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            // All-ones so the first commit of every worker sees an epoch
            // boundary and seeds its watermark.
            commit_watermarks: (0..workers).map(|_| AtomicU64::new(u64::MAX)).collect(),
            logger_epochs: (0..loggers).map(|_| AtomicU64::new(0)).collect(),
            durable: AtomicU64::new(0),
            interval,
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_epochs.len()
    }

    #[inline]
    pub fn logger_count(&self) -> usize {
        self.logger_epochs.len()
    }

    /// Acquire-loads the global epoch.
    #[inline]
    pub fn global_epoch(&self) -> u64 {
        self.global.load(Ordering::Acquire)
    }

    /// Unconditionally increments the global epoch. Only the leader's
    /// [`leader_work`](Self::leader_work) should reach this in normal
    /// operation.
    pub fn advance_global(&self) -> u64 {
        let mut expected = self.global_epoch();
        loop {
            match self.global.compare_exchange(
                expected,
                expected + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return expected + 1,
                Err(actual) => expected = actual,
            }
        }
    }

    /// Copies the global epoch into `worker`'s local slot and returns it.
    #[inline]
    pub fn publish_worker_epoch(&self, worker: usize) -> u64 {
        let epoch = self.global_epoch();
        self.worker_epochs[worker].store(epoch, Ordering::Release);
        epoch
    }

    #[inline]
    pub fn worker_epoch(&self, worker: usize) -> u64 {
        self.worker_epochs[worker].load(Ordering::Acquire)
    }

    /// True when every worker's local epoch equals the global epoch, i.e.
    /// no worker is still validating against an older epoch.
    pub fn workers_caught_up(&self) -> bool {
        let now = self.global_epoch();
        self.worker_epochs
            .iter()
            .all(|e| e.load(Ordering::Acquire) == now)
    }

    /// Leader duty, run once per loop iteration by worker 0: advance the
    /// global epoch if `interval` has elapsed since the last advance and no
    /// worker is lagging. Returns whether the epoch advanced.
    pub fn leader_work(&self, timer: &mut Instant) -> bool {
        if timer.elapsed() < self.interval {
            return false;
        }
        if !self.workers_caught_up() {
            return false;
        }
        let epoch = self.advance_global();
        tracing::trace!(epoch, "global epoch advanced");
        *timer = Instant::now();
        true
    }

    /// Raw commit version word most recently chosen by `worker`.
    #[inline]
    pub fn commit_watermark(&self, worker: usize) -> u64 {
        self.commit_watermarks[worker].load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_commit_watermark(&self, worker: usize, raw: u64) {
        self.commit_watermarks[worker].store(raw, Ordering::Release);
    }

    #[inline]
    pub fn logger_durable_epoch(&self, logger: usize) -> u64 {
        self.logger_epochs[logger].load(Ordering::Acquire)
    }

    /// Monotonically raises `logger`'s durable epoch. Returns whether the
    /// stored value actually increased.
    pub fn raise_logger_durable_epoch(&self, logger: usize, epoch: u64) -> bool {
        self.logger_epochs[logger].fetch_max(epoch, Ordering::AcqRel) < epoch
    }

    /// The process durable epoch: every commit at or below it is persisted.
    #[inline]
    pub fn durable_epoch(&self) -> u64 {
        self.durable.load(Ordering::Acquire)
    }

    /// Recomputes the process durable epoch as the minimum over all
    /// loggers. Returns the new value if it advanced.
    pub fn refresh_durable_epoch(&self) -> Option<u64> {
        let min = self
            .logger_epochs
            .iter()
            .map(|e| e.load(Ordering::Acquire))
            .min()
            .unwrap_or(0);
        if self.durable.fetch_max(min, Ordering::AcqRel) < min {
            Some(min)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_initial_epoch() {
        let clock = EpochClock::new(2, 1, Duration::from_millis(40));
        assert_eq!(clock.global_epoch(), INITIAL_EPOCH);
        assert_eq!(clock.worker_epoch(0), 0);
        assert_eq!(clock.durable_epoch(), 0);
        assert_eq!(clock.commit_watermark(0), u64::MAX);
    }

    #[test]
    fn test_leader_waits_for_laggards() {
        let clock = EpochClock::new(2, 1, Duration::ZERO);
        let mut timer = Instant::now() - Duration::from_secs(1);

        // Workers still at epoch 0: no advance.
        assert!(!clock.leader_work(&mut timer));
        assert_eq!(clock.global_epoch(), 1);

        clock.publish_worker_epoch(0);
        // One worker still lagging: no advance.
        assert!(!clock.leader_work(&mut timer));

        clock.publish_worker_epoch(1);
        assert!(clock.leader_work(&mut timer));
        assert_eq!(clock.global_epoch(), 2);

        // Locals are stale again after the advance.
        assert!(!clock.workers_caught_up());
    }

    #[test]
    fn test_leader_respects_interval() {
        let clock = EpochClock::new(1, 1, Duration::from_secs(3600));
        clock.publish_worker_epoch(0);
        let mut timer = Instant::now();
        assert!(!clock.leader_work(&mut timer));
        assert_eq!(clock.global_epoch(), 1);
    }

    #[test]
    fn test_publish_mirrors_global() {
        let clock = EpochClock::new(1, 1, Duration::ZERO);
        clock.advance_global();
        clock.advance_global();
        assert_eq!(clock.publish_worker_epoch(0), 3);
        assert_eq!(clock.worker_epoch(0), 3);
    }

    #[test]
    fn test_durable_is_min_over_loggers() {
        let clock = EpochClock::new(1, 2, Duration::ZERO);
        assert!(clock.raise_logger_durable_epoch(0, 5));
        assert_eq!(clock.refresh_durable_epoch(), None); // logger 1 still at 0

        assert!(clock.raise_logger_durable_epoch(1, 3));
        assert_eq!(clock.refresh_durable_epoch(), Some(3));
        assert_eq!(clock.durable_epoch(), 3);

        // Raising below the current value is a no-op.
        assert!(!clock.raise_logger_durable_epoch(0, 4));
        assert_eq!(clock.logger_durable_epoch(0), 5);
    }

    #[test]
    fn test_durable_epoch_is_monotone() {
        let clock = EpochClock::new(1, 1, Duration::ZERO);
        clock.raise_logger_durable_epoch(0, 7);
        assert_eq!(clock.refresh_durable_epoch(), Some(7));
        // A stale lower recomputation cannot move it backwards.
        assert_eq!(clock.refresh_durable_epoch(), None);
        assert_eq!(clock.durable_epoch(), 7);
    }

    #[test]
    fn test_concurrent_advances_are_counted() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(EpochClock::new(1, 1, Duration::ZERO));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.advance_global();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("thread panicked");
        }
        assert_eq!(clock.global_epoch(), INITIAL_EPOCH + 4000);
    }
}
