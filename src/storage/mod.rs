// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Single-version record storage behind the index capability.
//!
//! This module owns the record representation ([`Record`] with its packed
//! [`VersionWord`]) and the seam to the key→record index the engine runs
//! against. The index itself is a collaborator: the engine only requires
//! [`Index::get`] and [`Index::insert`], and any implementation with stable
//! record handles will do. [`ShardedHashIndex`] is the default.
//!
//! # Key Concepts
//!
//! Records are never moved or dropped while the engine runs: handles are
//! `Arc<Record>`, so read/write sets can hold them across a transaction
//! while concurrent optimistic readers do the same. A record's version word
//! is the only synchronization primitive in the data plane; everything else
//! (shard maps, populations) is off the transaction hot path.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use silokv::storage::{Index, Key, Record, ShardedHashIndex, StorageId, Value};
//!
//! let index = ShardedHashIndex::new(1);
//! let table = StorageId(0);
//! index
//!     .insert(table, Key(7), Arc::new(Record::new(Value::from(42u64))))
//!     .unwrap();
//!
//! let record = index.get(table, Key(7)).unwrap();
//! assert_eq!(record.payload(), Value::from(42u64));
//! ```

mod error;
mod hash_index;
mod record;

pub use error::StorageError;
pub use hash_index::ShardedHashIndex;
pub use record::{Record, VersionWord};

use std::sync::Arc;

/// Payload width in bytes. Payloads are a single machine word so optimistic
/// readers can copy them without any tearing hazard.
pub const VALUE_SIZE: usize = 8;

/// Identifies one table of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageId(pub u32);

impl StorageId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for StorageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A key within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub u64);

impl From<u64> for Key {
    fn from(k: u64) -> Self {
        Self(k)
    }
}

/// An opaque fixed-width payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value([u8; VALUE_SIZE]);

impl Value {
    /// Creates a new value from bytes.
    #[inline]
    pub fn new(bytes: [u8; VALUE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }

    #[inline]
    pub(crate) fn to_word(self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    #[inline]
    pub(crate) fn from_word(word: u64) -> Self {
        Self(word.to_le_bytes())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self(v.to_le_bytes())
    }
}

impl From<[u8; VALUE_SIZE]> for Value {
    fn from(bytes: [u8; VALUE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The index capability consumed by the engine.
///
/// Implementations must keep returned handles stable for the lifetime of
/// the store; transaction read/write sets and concurrent optimistic readers
/// hold them without coordination.
pub trait Index: Send + Sync + 'static {
    /// Looks up the record for `key` in `table`.
    fn get(&self, table: StorageId, key: Key) -> Option<Arc<Record>>;

    /// Registers a new record for `key` in `table`.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if any entry is present,
    /// absent placeholders included.
    fn insert(&self, table: StorageId, key: Key, record: Arc<Record>) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_u64_round_trips() {
        let v = Value::from(0xDEAD_BEEFu64);
        assert_eq!(Value::from_word(v.to_word()), v);
        assert_eq!(v.as_bytes(), &0xDEAD_BEEFu64.to_le_bytes());
    }

    #[test]
    fn test_value_default_is_zero() {
        assert_eq!(Value::default(), Value::from(0u64));
    }

    #[test]
    fn test_key_ordering_is_numeric() {
        assert!(Key(2) < Key(10));
    }

    #[test]
    fn test_storage_qualified_order() {
        // Write sets sort by (table, key); the table dominates.
        let a = (StorageId(0), Key(9));
        let b = (StorageId(1), Key(1));
        assert!(a < b);
    }
}
