// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Workload capability: synthetic operation streams.
//!
//! The engine consumes a bounded sequence of procedures per transaction
//! attempt and re-invokes the workload fully on every retry. Key and
//! operation synthesis is a collaborator concern; [`UniformWorkload`] is
//! the default single-table generator.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::storage::{Key, StorageId, Value};

/// Operation kind within a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
    /// Read the key, then write it back within the same transaction.
    ReadModifyWrite,
}

/// One operation of a transaction attempt.
#[derive(Debug, Clone, Copy)]
pub struct Procedure {
    pub op: Op,
    pub table: StorageId,
    pub key: Key,
    pub value: Value,
}

/// Produces the operation stream for one transaction attempt.
pub trait Workload: Send {
    /// Fills `out` with the next attempt's procedures, replacing any
    /// previous content.
    fn next_transaction(&mut self, out: &mut Vec<Procedure>);
}

/// Uniform-random single-table workload: a fixed number of operations per
/// transaction, split between reads and writes by percentage.
pub struct UniformWorkload {
    rng: SmallRng,
    table: StorageId,
    records: u64,
    ops_per_transaction: usize,
    read_ratio: u32,
    read_modify_write: bool,
}

impl UniformWorkload {
    /// `read_ratio` is the percentage of read operations, 0..=100.
    pub fn new(seed: u64, records: u64, ops_per_transaction: usize, read_ratio: u32) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            table: StorageId(0),
            records,
            ops_per_transaction,
            read_ratio: read_ratio.min(100),
            read_modify_write: false,
        }
    }

    pub fn with_table(mut self, table: StorageId) -> Self {
        self.table = table;
        self
    }

    /// Issue writes as read-modify-write pairs instead of blind writes.
    pub fn with_read_modify_write(mut self, enabled: bool) -> Self {
        self.read_modify_write = enabled;
        self
    }
}

impl Workload for UniformWorkload {
    fn next_transaction(&mut self, out: &mut Vec<Procedure>) {
        out.clear();
        for _ in 0..self.ops_per_transaction {
            let key = Key(self.rng.gen_range(0..self.records));
            let op = if self.rng.gen_range(0..100) < self.read_ratio {
                Op::Read
            } else if self.read_modify_write {
                Op::ReadModifyWrite
            } else {
                Op::Write
            };
            out.push(Procedure {
                op,
                table: self.table,
                key,
                value: Value::from(self.rng.gen::<u64>()),
            });
        }
    }
}
