//! Change type for incremental evaluation.
//!
//! A Change represents a weighted update to a data item at a logical time.
//! Positive weights are insertions, negative weights are retractions.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Signed multiplicity of a change.
pub type Weight = i64;

/// Logical time of a change: the transaction epoch, then the fixpoint
/// iteration within it. Ordered lexicographically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Commit counter, advanced once per committed transaction.
    pub epoch: u64,
    /// Fixpoint round within the epoch.
    pub iteration: u32,
}

impl Timestamp {
    /// Creates a timestamp.
    #[inline]
    pub const fn new(epoch: u64, iteration: u32) -> Self {
        Self { epoch, iteration }
    }

    /// The first timestamp of an epoch.
    #[inline]
    pub const fn at_epoch(epoch: u64) -> Self {
        Self::new(epoch, 0)
    }

    /// The least upper bound of two timestamps.
    #[inline]
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }
}

/// A weighted change to a data item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change<T> {
    /// The data being changed
    pub data: T,
    /// The multiplicity of the change
    pub diff: Weight,
    /// When the change happened
    pub time: Timestamp,
}

impl<T> Change<T> {
    /// Creates a new change with the given data, diff and time.
    #[inline]
    pub fn new(data: T, diff: Weight, time: Timestamp) -> Self {
        Self { data, diff, time }
    }

    /// Creates an insertion (+1).
    #[inline]
    pub fn insert(data: T, time: Timestamp) -> Self {
        Self::new(data, 1, time)
    }

    /// Creates a deletion (-1).
    #[inline]
    pub fn delete(data: T, time: Timestamp) -> Self {
        Self::new(data, -1, time)
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

}

/// A batch of changes.
pub type ChangeBatch<T> = Vec<Change<T>>;

/// Extension trait for working with change batches.
pub trait ChangeBatchExt<T> {
    /// Sums the weights of equal data items, dropping those that cancel.
    ///
    /// The result is sorted by data; each item carries the latest time of the
    /// changes it was built from.
    fn consolidate(self) -> Self
    where
        T: Ord;
}

impl<T> ChangeBatchExt<T> for ChangeBatch<T> {
    fn consolidate(self) -> Self
    where
        T: Ord,
    {
        let mut merged: BTreeMap<T, (Weight, Timestamp)> = BTreeMap::new();
        for change in self {
            let entry = merged.entry(change.data).or_insert((0, change.time));
            entry.0 += change.diff;
            entry.1 = entry.1.join(change.time);
        }
        merged
            .into_iter()
            .filter(|(_, (diff, _))| *diff != 0)
            .map(|(data, (diff, time))| Change::new(data, diff, time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const T0: Timestamp = Timestamp::at_epoch(1);

    #[test]
    fn test_change_insert() {
        let c = Change::insert(42, T0);
        assert!(c.is_insert());
        assert!(!c.is_delete());
        assert_eq!(c.diff, 1);
        assert_eq!(c.data, 42);
    }

    #[test]
    fn test_change_delete() {
        let c = Change::delete(42, T0);
        assert!(!c.is_insert());
        assert!(c.is_delete());
        assert_eq!(c.diff, -1);
    }

    #[test]
    fn test_timestamp_order() {
        assert!(Timestamp::new(1, 9) < Timestamp::new(2, 0));
        assert!(Timestamp::new(2, 0) < Timestamp::new(2, 1));
        assert_eq!(Timestamp::new(1, 3).join(Timestamp::new(1, 5)), Timestamp::new(1, 5));
        assert_eq!(Timestamp::at_epoch(1), Timestamp::new(1, 0));
    }

    #[test]
    fn test_batch_consolidate() {
        let later = Timestamp::new(1, 2);
        let batch: ChangeBatch<i32> = vec![
            Change::insert(2, T0),
            Change::insert(1, T0),
            Change::delete(2, later),
            Change::insert(1, later),
            Change::delete(3, T0),
        ];
        let consolidated = batch.consolidate();
        assert_eq!(
            consolidated,
            vec![Change::new(1, 2, later), Change::new(3, -1, T0)]
        );
    }
}
