//! Per-relation collection state.
//!
//! A `Collection` tracks, for every tuple of one relation, its derivation
//! count and whether it is currently present. Derivation counts are the
//! summed weights of every change ever routed to the relation; presence is
//! what the rest of the program observes.
//!
//! Outside of a running commit, a tuple is present exactly when its count is
//! positive. Inside a recursive stratum the two can temporarily disagree while
//! the scheduler over-deletes and re-derives.

use crate::change::Weight;
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::{HashMap, HashSet};

/// Derivation counts and presence of one relation's tuples.
#[derive(Clone, Debug)]
pub struct Collection<T> {
    /// Tuple -> summed weight; zero entries are removed
    counts: HashMap<T, Weight>,
    /// Tuples currently visible to rules and to the host
    present: HashSet<T>,
}

impl<T> Default for Collection<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Collection<T>
where
    T: Eq + Hash,
{
    /// Creates a new empty collection.
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            present: HashSet::new(),
        }
    }

    /// Returns the derivation count of a tuple.
    pub fn count(&self, data: &T) -> Weight {
        self.counts.get(data).copied().unwrap_or(0)
    }

    /// Returns true if the tuple is currently present.
    pub fn contains(&self, data: &T) -> bool {
        self.present.contains(data)
    }

    /// Returns the number of present tuples.
    #[inline]
    pub fn len(&self) -> usize {
        self.present.len()
    }

    /// Returns true if no tuple is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Iterates over present tuples in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.present.iter()
    }

    /// Returns the number of tuples with a non-zero count.
    pub fn counted_len(&self) -> usize {
        self.counts.len()
    }
}

impl<T> Collection<T>
where
    T: Eq + Hash + Clone,
{
    /// Adds `diff` to a tuple's derivation count and returns the new count.
    pub fn add_count(&mut self, data: &T, diff: Weight) -> Weight {
        if diff == 0 {
            return self.count(data);
        }
        let count = match self.counts.get_mut(data) {
            Some(count) => {
                *count += diff;
                *count
            }
            None => {
                self.counts.insert(data.clone(), diff);
                diff
            }
        };
        if count == 0 {
            self.counts.remove(data);
        }
        count
    }

    /// Marks a tuple present or absent. Returns true if presence changed.
    pub fn set_present(&mut self, data: &T, present: bool) -> bool {
        if present {
            if self.present.contains(data) {
                false
            } else {
                self.present.insert(data.clone());
                true
            }
        } else {
            self.present.remove(data)
        }
    }

    /// Returns the presence diff (+1, -1 or 0) needed to make presence agree
    /// with the derivation count of `data`.
    pub fn pending_transition(&self, data: &T) -> Weight {
        let should = self.count(data) > 0;
        match (self.contains(data), should) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        }
    }
}

impl<T> Collection<T>
where
    T: Eq + Hash + Clone + Ord,
{
    /// Returns the present tuples in sorted order.
    pub fn to_sorted_vec(&self) -> Vec<T> {
        let mut tuples: Vec<T> = self.present.iter().cloned().collect();
        tuples.sort();
        tuples
    }
}
