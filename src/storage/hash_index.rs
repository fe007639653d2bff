// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Default sharded hash index.
//!
//! Per-table, 256-way sharded hash maps. The shard locks sit entirely off
//! the transaction hot path: optimistic reads and the validation protocol
//! only touch record version words, never these locks.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::StorageError;
use super::record::Record;
use super::{Index, Key, StorageId};

const NUM_SHARDS: usize = 256;

struct Table {
    shards: [RwLock<HashMap<Key, Arc<Record>>>; NUM_SHARDS],
}

impl Table {
    fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(HashMap::new())),
        }
    }
}

/// Sharded in-memory hash index with stable `Arc<Record>` handles.
pub struct ShardedHashIndex {
    tables: Vec<Table>,
}

impl ShardedHashIndex {
    /// Creates an index with `tables` empty tables.
    pub fn new(tables: usize) -> Self {
        Self {
            tables: (0..tables).map(|_| Table::new()).collect(),
        }
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    fn shard_index(key: Key) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % NUM_SHARDS
    }
}

impl Index for ShardedHashIndex {
    fn get(&self, table: StorageId, key: Key) -> Option<Arc<Record>> {
        let table = self.tables.get(table.as_usize())?;
        let shard = table.shards[Self::shard_index(key)].read();
        shard.get(&key).cloned()
    }

    fn insert(&self, table: StorageId, key: Key, record: Arc<Record>) -> Result<(), StorageError> {
        let table = self
            .tables
            .get(table.as_usize())
            .ok_or(StorageError::NotFound)?;
        let mut shard = table.shards[Self::shard_index(key)].write();
        match shard.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => Err(StorageError::AlreadyExists),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    #[test]
    fn test_insert_and_get() {
        let index = ShardedHashIndex::new(2);
        let record = Arc::new(Record::new(Value::from(5u64)));
        index.insert(StorageId(1), Key(42), record).unwrap();

        let found = index.get(StorageId(1), Key(42)).unwrap();
        assert_eq!(found.payload(), Value::from(5u64));

        // Same key in a different table is independent.
        assert!(index.get(StorageId(0), Key(42)).is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let index = ShardedHashIndex::new(1);
        index
            .insert(StorageId(0), Key(1), Arc::new(Record::new(Value::from(1u64))))
            .unwrap();
        let err = index
            .insert(StorageId(0), Key(1), Arc::new(Record::new(Value::from(2u64))))
            .unwrap_err();
        assert_eq!(err, StorageError::AlreadyExists);
    }

    #[test]
    fn test_unknown_table() {
        let index = ShardedHashIndex::new(1);
        assert!(index.get(StorageId(3), Key(0)).is_none());
        let err = index
            .insert(StorageId(3), Key(0), Arc::new(Record::new(Value::default())))
            .unwrap_err();
        assert_eq!(err, StorageError::NotFound);
    }

    #[test]
    fn test_handles_are_stable() {
        let index = ShardedHashIndex::new(1);
        let record = Arc::new(Record::new(Value::from(9u64)));
        index.insert(StorageId(0), Key(7), Arc::clone(&record)).unwrap();
        let found = index.get(StorageId(0), Key(7)).unwrap();
        assert!(Arc::ptr_eq(&record, &found));
    }
}
