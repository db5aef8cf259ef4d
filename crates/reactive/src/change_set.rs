//! Change set for tracking relation changes.
//!
//! A ChangeSet is what one commit did to one relation: the tuples that became
//! present and the tuples that stopped being present.

use alloc::vec::Vec;
use stratalog_core::Tuple;
use stratalog_incremental::{Change, RelId};

/// The changes of one relation at one epoch.
///
/// Both lists are sorted and disjoint; a tuple never appears in both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The relation that changed
    pub relation: RelId,
    /// Epoch of the commit that produced the changes
    pub epoch: u64,
    /// Tuples that became present
    pub added: Vec<Tuple>,
    /// Tuples that became absent
    pub removed: Vec<Tuple>,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new(relation: RelId, epoch: u64) -> Self {
        Self {
            relation,
            epoch,
            ..Self::default()
        }
    }

    /// Creates a change set from the net changes of a commit.
    ///
    /// Changes with diff > 0 become additions, diff < 0 become removals.
    pub fn from_changes(relation: RelId, epoch: u64, changes: &[Change<Tuple>]) -> Self {
        let mut set = Self::new(relation, epoch);
        for change in changes {
            if change.is_insert() {
                set.added.push(change.data.clone());
            } else if change.is_delete() {
                set.removed.push(change.data.clone());
            }
        }
        set.added.sort();
        set.removed.sort();
        set
    }

    /// Creates a change set adding every tuple of a current state.
    pub fn initial(relation: RelId, epoch: u64, tuples: Vec<Tuple>) -> Self {
        Self {
            relation,
            epoch,
            added: tuples,
            removed: Vec::new(),
        }
    }

    /// Creates a change set removing every tuple of a current state.
    pub fn clearing(relation: RelId, epoch: u64, tuples: Vec<Tuple>) -> Self {
        Self {
            relation,
            epoch,
            added: Vec::new(),
            removed: tuples,
        }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Returns the change set that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            relation: self.relation,
            epoch: self.epoch,
            added: self.removed.clone(),
            removed: self.added.clone(),
        }
    }

    /// Returns the changes as unit-weight `(tuple, diff)` pairs, removals
    /// first.
    pub fn diffs(&self) -> impl Iterator<Item = (&Tuple, i64)> + '_ {
        self.removed
            .iter()
            .map(|t| (t, -1))
            .chain(self.added.iter().map(|t| (t, 1)))
    }
}
