// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Worker-to-logger grouping.
//!
//! Workers are spread round-robin over the loggers; each group shares one
//! log queue and one durable-epoch slot. Thread placement on cores is a
//! driver concern, not handled here.

/// Static assignment of workers to logger groups.
#[derive(Debug, Clone)]
pub struct LoggerAffinity {
    groups: Vec<Vec<usize>>,
    workers: usize,
}

impl LoggerAffinity {
    pub fn new(workers: usize, loggers: usize) -> Self {
        let mut groups = vec![Vec::new(); loggers];
        for worker in 0..workers {
            groups[worker * loggers / workers].push(worker);
        }
        Self { groups, workers }
    }

    /// The logger group `worker` belongs to.
    pub fn logger_for(&self, worker: usize) -> usize {
        worker * self.groups.len() / self.workers
    }

    /// Workers assigned to `logger`.
    pub fn workers_of(&self, logger: usize) -> &[usize] {
        &self.groups[logger]
    }

    pub fn logger_count(&self) -> usize {
        self.groups.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let affinity = LoggerAffinity::new(4, 2);
        assert_eq!(affinity.workers_of(0), &[0, 1]);
        assert_eq!(affinity.workers_of(1), &[2, 3]);
        assert_eq!(affinity.logger_for(1), 0);
        assert_eq!(affinity.logger_for(2), 1);
    }

    #[test]
    fn test_single_logger_takes_all() {
        let affinity = LoggerAffinity::new(3, 1);
        assert_eq!(affinity.workers_of(0), &[0, 1, 2]);
    }

    #[test]
    fn test_uneven_split_covers_every_group() {
        let affinity = LoggerAffinity::new(3, 2);
        assert_eq!(affinity.workers_of(0), &[0, 1]);
        assert_eq!(affinity.workers_of(1), &[2]);
        for logger in 0..affinity.logger_count() {
            assert!(!affinity.workers_of(logger).is_empty());
        }
    }
}
