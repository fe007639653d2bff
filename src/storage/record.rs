// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Versioned record cells and the packed version word.
//!
//! A [`VersionWord`] packs the entire concurrency-control state of a record
//! into one 64-bit integer so that it can be loaded, stored, and
//! compare-and-swapped as a single atomic unit:
//!
//! | bits    | field  | meaning                                             |
//! |---------|--------|-----------------------------------------------------|
//! | 0       | lock   | record is held exclusively by a committing writer   |
//! | 1       | latest | record holds the newest version                     |
//! | 2       | absent | placeholder for a not-yet-committed insert          |
//! | 3..=31  | tid    | per-epoch transaction-id disambiguator (29 bits)    |
//! | 32..=63 | epoch  | epoch in which this version committed (32 bits)     |
//!
//! Version words are totally ordered by their raw integer value, which makes
//! the epoch the most significant component, then the transaction id. That
//! order is what commit-id computation takes maxima over.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::epoch::INITIAL_EPOCH;

use super::Value;

const LOCK_BIT: u64 = 1 << 0;
const LATEST_BIT: u64 = 1 << 1;
const ABSENT_BIT: u64 = 1 << 2;
const TID_SHIFT: u32 = 3;
const TID_BITS: u32 = 29;
const TID_FIELD: u64 = (1 << TID_BITS) - 1;
const EPOCH_SHIFT: u32 = 32;
const EPOCH_FIELD: u64 = (1 << 32) - 1;

/// Packed 64-bit record-version token.
///
/// All mutation goes through the returned-by-value `with_*` builders; the
/// atomic cell lives in [`Record`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionWord(u64);

impl VersionWord {
    /// A fresh word: unlocked, latest, present, tid 0, epoch 0.
    #[inline]
    pub fn new() -> Self {
        Self(LATEST_BIT)
    }

    /// Reconstructs a word from its raw integer representation.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_locked(self) -> bool {
        self.0 & LOCK_BIT != 0
    }

    #[inline]
    pub fn is_latest(self) -> bool {
        self.0 & LATEST_BIT != 0
    }

    #[inline]
    pub fn is_absent(self) -> bool {
        self.0 & ABSENT_BIT != 0
    }

    /// Transaction-id disambiguator within the epoch (29 bits).
    #[inline]
    pub fn tid(self) -> u64 {
        (self.0 >> TID_SHIFT) & TID_FIELD
    }

    /// Epoch in which this version was committed (32 bits).
    #[inline]
    pub fn epoch(self) -> u64 {
        (self.0 >> EPOCH_SHIFT) & EPOCH_FIELD
    }

    #[inline]
    pub fn with_locked(self, locked: bool) -> Self {
        if locked {
            Self(self.0 | LOCK_BIT)
        } else {
            Self(self.0 & !LOCK_BIT)
        }
    }

    #[inline]
    pub fn with_latest(self, latest: bool) -> Self {
        if latest {
            Self(self.0 | LATEST_BIT)
        } else {
            Self(self.0 & !LATEST_BIT)
        }
    }

    #[inline]
    pub fn with_absent(self, absent: bool) -> Self {
        if absent {
            Self(self.0 | ABSENT_BIT)
        } else {
            Self(self.0 & !ABSENT_BIT)
        }
    }

    /// Replaces the transaction id, truncated to its 29-bit field.
    #[inline]
    pub fn with_tid(self, tid: u64) -> Self {
        Self((self.0 & !(TID_FIELD << TID_SHIFT)) | ((tid & TID_FIELD) << TID_SHIFT))
    }

    /// Replaces the epoch, truncated to its 32-bit field.
    #[inline]
    pub fn with_epoch(self, epoch: u64) -> Self {
        Self((self.0 & !(EPOCH_FIELD << EPOCH_SHIFT)) | ((epoch & EPOCH_FIELD) << EPOCH_SHIFT))
    }

    /// Increments the transaction id, wrapping within its field.
    #[inline]
    pub fn bump_tid(self) -> Self {
        self.with_tid(self.tid().wrapping_add(1))
    }
}

impl Default for VersionWord {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VersionWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionWord")
            .field("epoch", &self.epoch())
            .field("tid", &self.tid())
            .field("lock", &self.is_locked())
            .field("latest", &self.is_latest())
            .field("absent", &self.is_absent())
            .finish()
    }
}

/// A single-version value cell, owned by the index.
///
/// The version word is the only lock protocol in the engine: a committer
/// sets the lock bit with a CAS, mutates the payload, and releases by
/// storing the commit word. Readers never lock; they copy the payload
/// between two acquire-loads of the version word and retry until the loads
/// agree (the protocol lives in the transaction executor).
///
/// The payload is a single word as well, so a concurrent reader can never
/// observe a torn value even mid-commit.
pub struct Record {
    tidword: AtomicU64,
    payload: AtomicU64,
}

impl Record {
    /// Creates a committed record at the initial epoch.
    pub fn new(value: Value) -> Self {
        let word = VersionWord::new().with_epoch(INITIAL_EPOCH);
        Self {
            tidword: AtomicU64::new(word.raw()),
            payload: AtomicU64::new(value.to_word()),
        }
    }

    /// Creates an absent placeholder for a not-yet-committed insert.
    ///
    /// The record is invisible to readers until the inserting transaction's
    /// write phase stores a commit word with the absent bit cleared.
    pub fn new_absent(value: Value) -> Self {
        let word = VersionWord::new().with_absent(true);
        Self {
            tidword: AtomicU64::new(word.raw()),
            payload: AtomicU64::new(value.to_word()),
        }
    }

    /// Acquire-loads the version word.
    #[inline]
    pub fn version(&self) -> VersionWord {
        VersionWord::from_raw(self.tidword.load(Ordering::Acquire))
    }

    /// Release-stores the version word. Publishes any preceding payload
    /// store to subsequent acquire-loaders.
    #[inline]
    pub fn set_version(&self, word: VersionWord) {
        self.tidword.store(word.raw(), Ordering::Release);
    }

    /// Single-shot CAS on the version word. On failure returns the word
    /// actually observed so the caller can decide whether to retry.
    #[inline]
    pub fn compare_and_swap(
        &self,
        expected: VersionWord,
        desired: VersionWord,
    ) -> Result<(), VersionWord> {
        self.tidword
            .compare_exchange(
                expected.raw(),
                desired.raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(VersionWord::from_raw)
    }

    /// Copies the payload. Consistency is the caller's responsibility via
    /// the two-consecutive-loads protocol on the version word.
    #[inline]
    pub fn payload(&self) -> Value {
        Value::from_word(self.payload.load(Ordering::Acquire))
    }

    /// Overwrites the payload. Only the committer holding the lock bit may
    /// call this for an already-visible record.
    #[inline]
    pub fn set_payload(&self, value: Value) {
        self.payload.store(value.to_word(), Ordering::Release);
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("version", &self.version())
            .field("payload", &self.payload())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_word_is_latest_only() {
        let w = VersionWord::new();
        assert!(w.is_latest());
        assert!(!w.is_locked());
        assert!(!w.is_absent());
        assert_eq!(w.tid(), 0);
        assert_eq!(w.epoch(), 0);
    }

    #[test]
    fn test_field_round_trip() {
        let w = VersionWord::new()
            .with_locked(true)
            .with_absent(true)
            .with_tid(12345)
            .with_epoch(678);
        assert!(w.is_locked());
        assert!(w.is_latest());
        assert!(w.is_absent());
        assert_eq!(w.tid(), 12345);
        assert_eq!(w.epoch(), 678);

        let cleared = w.with_locked(false).with_absent(false);
        assert!(!cleared.is_locked());
        assert!(!cleared.is_absent());
        assert_eq!(cleared.tid(), 12345);
        assert_eq!(cleared.epoch(), 678);
    }

    #[test]
    fn test_tid_truncates_to_field() {
        let w = VersionWord::new().with_tid(u64::MAX);
        assert_eq!(w.tid(), (1 << 29) - 1);
        assert_eq!(w.epoch(), 0);
    }

    #[test]
    fn test_bump_tid_wraps() {
        let w = VersionWord::new().with_tid((1 << 29) - 1);
        assert_eq!(w.bump_tid().tid(), 0);
    }

    #[test]
    fn test_epoch_dominates_ordering() {
        let older = VersionWord::new().with_epoch(1).with_tid((1 << 29) - 1);
        let newer = VersionWord::new().with_epoch(2).with_tid(0);
        assert!(older < newer);
    }

    #[test]
    fn test_tid_orders_within_epoch() {
        let a = VersionWord::new().with_epoch(5).with_tid(7);
        let b = VersionWord::new().with_epoch(5).with_tid(8);
        assert!(a < b);
    }

    #[test]
    fn test_record_cas_lock() {
        let record = Record::new(Value::from(7u64));
        let before = record.version();
        assert!(record
            .compare_and_swap(before, before.with_locked(true))
            .is_ok());
        assert!(record.version().is_locked());

        // A second lock attempt against the stale word fails and reports
        // the locked word.
        let err = record
            .compare_and_swap(before, before.with_locked(true))
            .unwrap_err();
        assert!(err.is_locked());
    }

    #[test]
    fn test_record_absent_placeholder() {
        let record = Record::new_absent(Value::from(1u64));
        assert!(record.version().is_absent());
        assert_eq!(record.payload(), Value::from(1u64));

        let commit = VersionWord::new().with_epoch(1).with_tid(1);
        record.set_version(commit);
        assert!(!record.version().is_absent());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fields_round_trip(
            lock in any::<bool>(),
            latest in any::<bool>(),
            absent in any::<bool>(),
            tid in 0u64..(1 << 29),
            epoch in 0u64..=u32::MAX as u64,
        ) {
            let w = VersionWord::new()
                .with_locked(lock)
                .with_latest(latest)
                .with_absent(absent)
                .with_tid(tid)
                .with_epoch(epoch);
            prop_assert_eq!(w.is_locked(), lock);
            prop_assert_eq!(w.is_latest(), latest);
            prop_assert_eq!(w.is_absent(), absent);
            prop_assert_eq!(w.tid(), tid);
            prop_assert_eq!(w.epoch(), epoch);
        }

        #[test]
        fn raw_round_trip(raw in any::<u64>()) {
            prop_assert_eq!(VersionWord::from_raw(raw).raw(), raw);
        }

        #[test]
        fn higher_epoch_always_orders_later(
            e1 in 0u64..u32::MAX as u64,
            t1 in 0u64..(1 << 29),
            t2 in 0u64..(1 << 29),
        ) {
            let a = VersionWord::new().with_epoch(e1).with_tid(t1);
            let b = VersionWord::new().with_epoch(e1 + 1).with_tid(t2);
            prop_assert!(a < b);
        }
    }
}
