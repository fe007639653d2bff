// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction-local read/write-set elements.
//!
//! Elements are owned exclusively by one executor: created while the
//! transaction runs, cleared at abort or after the write phase. The record
//! handles they hold keep index records alive and pinned for the
//! validation re-checks.

use std::sync::Arc;

use crate::storage::{Key, Record, StorageId, Value, VersionWord};

/// Write-set operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Overwrite of an existing, visible record.
    Update,
    /// Newly inserted record, invisible (absent) until the write phase.
    Insert,
}

/// One consistent read: the observed payload and the version word the
/// commit-time validation must re-find.
pub struct ReadElement {
    pub(crate) table: StorageId,
    pub(crate) key: Key,
    pub(crate) record: Arc<Record>,
    pub(crate) value: Value,
    pub(crate) word: VersionWord,
}

impl ReadElement {
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    /// Version word observed at read time.
    #[inline]
    pub fn word(&self) -> VersionWord {
        self.word
    }
}

/// One buffered mutation, applied to its record only during the write
/// phase of a successful commit.
pub struct WriteElement {
    pub(crate) table: StorageId,
    pub(crate) key: Key,
    pub(crate) record: Arc<Record>,
    pub(crate) value: Value,
    pub(crate) kind: WriteKind,
}

impl WriteElement {
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn kind(&self) -> WriteKind {
        self.kind
    }
}
