//! Arrangements: keyed indexes over relation contents.
//!
//! An `Arrangement` indexes one relation by one key projection. Its content is
//! the sum of every change applied to it. The `ArrangementStore` owns all
//! arrangements of a program, hands out stable handles, and shares a single
//! arrangement between every operator that asks for the same
//! `(relation, projection)` pair.
//!
//! Operators only ever read arrangements. All mutation goes through
//! [`ArrangementStore::apply`], which the scheduler calls between rounds.

use crate::change::{Change, ChangeBatch, ChangeBatchExt, Timestamp, Weight};
use crate::dataflow::RelId;
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::{KeyProjection, Tuple};
use tracing::trace;

/// Stable handle to an arrangement inside an [`ArrangementStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrangementHandle(usize);

impl ArrangementHandle {
    /// Returns the raw index of the handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    weight: Weight,
    time: Timestamp,
}

/// A relation indexed by a key projection.
#[derive(Clone, Debug)]
pub struct Arrangement {
    relation: RelId,
    key: KeyProjection,
    /// key -> tuple -> (weight, last update time); zero weights are removed
    index: HashMap<Tuple, HashMap<Tuple, Entry>>,
    len: usize,
}

impl Arrangement {
    fn new(relation: RelId, key: KeyProjection) -> Self {
        Self {
            relation,
            key,
            index: HashMap::new(),
            len: 0,
        }
    }

    /// Returns the arranged relation.
    #[inline]
    pub fn relation(&self) -> RelId {
        self.relation
    }

    /// Returns the key projection.
    #[inline]
    pub fn key(&self) -> &KeyProjection {
        &self.key
    }

    /// Returns the number of distinct tuples with non-zero weight.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the arrangement holds nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Iterates over the tuples stored under `key`.
    pub fn matches<'a>(
        &'a self,
        key: &Tuple,
    ) -> impl Iterator<Item = (&'a Tuple, Weight, Timestamp)> + 'a {
        self.index
            .get(key)
            .into_iter()
            .flat_map(|group| group.iter().map(|(t, e)| (t, e.weight, e.time)))
    }

    /// Returns the summed weight of the tuples stored under `key`.
    pub fn key_weight(&self, key: &Tuple) -> Weight {
        self.index
            .get(key)
            .map(|group| group.values().map(|e| e.weight).sum())
            .unwrap_or(0)
    }

    /// Returns the weight of one tuple.
    pub fn weight(&self, tuple: &Tuple) -> Weight {
        let key = tuple.project(&self.key);
        self.index
            .get(&key)
            .and_then(|group| group.get(tuple))
            .map(|e| e.weight)
            .unwrap_or(0)
    }

    /// Returns the time of the last change to one tuple.
    pub fn time(&self, tuple: &Tuple) -> Option<Timestamp> {
        let key = tuple.project(&self.key);
        self.index.get(&key).and_then(|group| group.get(tuple)).map(|e| e.time)
    }

    /// Iterates over every stored tuple.
    pub fn iter(&self) -> impl Iterator<Item = (&Tuple, Weight, Timestamp)> + '_ {
        self.index
            .values()
            .flat_map(|group| group.iter().map(|(t, e)| (t, e.weight, e.time)))
    }

    /// Adds a weighted change to one tuple. Returns the presence transition
    /// (+1 or -1) if the tuple's weight crossed zero.
    fn update(&mut self, tuple: Tuple, diff: Weight, time: Timestamp) -> Option<Weight> {
        let key = tuple.project(&self.key);
        let group = self.index.entry(key.clone()).or_default();
        let old = group.get(&tuple).map(|e| e.weight).unwrap_or(0);
        let new = old + diff;

        if new == 0 {
            group.remove(&tuple);
            self.len -= 1;
            if group.is_empty() {
                self.index.remove(&key);
            }
        } else {
            if old == 0 {
                self.len += 1;
            }
            group.insert(tuple, Entry { weight: new, time });
        }

        match (old > 0, new > 0) {
            (false, true) => Some(1),
            (true, false) => Some(-1),
            _ => None,
        }
    }
}

/// Owner of every arrangement of a program.
#[derive(Clone, Debug, Default)]
pub struct ArrangementStore {
    arrangements: Vec<Arrangement>,
    lookup: HashMap<(RelId, KeyProjection), ArrangementHandle>,
    by_relation: HashMap<RelId, Vec<ArrangementHandle>>,
}

impl ArrangementStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the arrangement of `relation` by `key`, creating it if needed.
    ///
    /// Requests for an identical pair return the same handle.
    pub fn get_or_create(&mut self, relation: RelId, key: KeyProjection) -> ArrangementHandle {
        if let Some(&handle) = self.lookup.get(&(relation, key.clone())) {
            return handle;
        }
        let handle = ArrangementHandle(self.arrangements.len());
        trace!(relation, key = ?key.columns(), handle = handle.0, "created arrangement");
        self.arrangements.push(Arrangement::new(relation, key.clone()));
        self.lookup.insert((relation, key), handle);
        self.by_relation.entry(relation).or_default().push(handle);
        handle
    }

    /// Returns the arrangement behind a handle issued by this store.
    #[inline]
    pub fn get(&self, handle: ArrangementHandle) -> &Arrangement {
        &self.arrangements[handle.0]
    }

    /// Returns the handles of every arrangement over `relation`.
    pub fn handles_for(&self, relation: RelId) -> &[ArrangementHandle] {
        self.by_relation
            .get(&relation)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the number of arrangements.
    #[inline]
    pub fn len(&self) -> usize {
        self.arrangements.len()
    }

    /// Returns true if the store holds no arrangement.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arrangements.is_empty()
    }

    /// Applies a batch of changes to one arrangement.
    ///
    /// Changes to the same tuple are summed first, so an insertion cancelled
    /// by a deletion in the same batch leaves no trace. Returns the
    /// presence transitions (weight +1 or -1) of the tuples whose weight
    /// crossed zero, stamped with the latest contributing time.
    pub fn apply(&mut self, handle: ArrangementHandle, changes: ChangeBatch<Tuple>) -> ChangeBatch<Tuple> {
        let arrangement = &mut self.arrangements[handle.0];
        let mut transitions = Vec::new();
        for change in changes.consolidate() {
            let data = change.data.clone();
            if let Some(diff) = arrangement.update(change.data, change.diff, change.time) {
                transitions.push(Change::new(data, diff, change.time));
            }
        }
        transitions
    }

    /// Returns the time of the last change to `tuple` in the arrangements of
    /// `relation`.
    pub fn last_update(&self, relation: RelId, tuple: &Tuple) -> Option<Timestamp> {
        let handle = *self.handles_for(relation).first()?;
        self.get(handle).time(tuple)
    }

    /// Applies the same batch to every arrangement of `relation`.
    pub fn apply_relation(&mut self, relation: RelId, changes: &[Change<Tuple>]) {
        if changes.is_empty() {
            return;
        }
        let handles = self.handles_for(relation).to_vec();
        for handle in handles {
            self.apply(handle, changes.to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use stratalog_core::tuple;

    const T1: Timestamp = Timestamp::at_epoch(1);

    #[test]
    fn test_get_or_create_dedups() {
        let mut store = ArrangementStore::new();
        let a = store.get_or_create(0, KeyProjection::from([0]));
        let b = store.get_or_create(0, KeyProjection::from([0]));
        let c = store.get_or_create(0, KeyProjection::from([1]));
        let d = store.get_or_create(1, KeyProjection::from([0]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(store.len(), 3);
        assert_eq!(store.handles_for(0), &[a, c]);
    }

    #[test]
    fn test_apply_reports_transitions() {
        let mut store = ArrangementStore::new();
        let h = store.get_or_create(0, KeyProjection::from([0]));

        let out = store.apply(h, vec![Change::insert(tuple![1i64, 2i64], T1)]);
        assert_eq!(out, vec![Change::insert(tuple![1i64, 2i64], T1)]);

        // A second insertion raises the weight without a transition.
        let out = store.apply(h, vec![Change::insert(tuple![1i64, 2i64], T1)]);
        assert!(out.is_empty());
        assert_eq!(store.get(h).weight(&tuple![1i64, 2i64]), 2);

        let out = store.apply(h, vec![Change::new(tuple![1i64, 2i64], -2, T1)]);
        assert_eq!(out, vec![Change::delete(tuple![1i64, 2i64], T1)]);
        assert!(store.get(h).is_empty());
    }

    #[test]
    fn test_insert_then_delete_in_batch_is_silent() {
        let mut store = ArrangementStore::new();
        let h = store.get_or_create(0, KeyProjection::from([0]));
        let out = store.apply(
            h,
            vec![
                Change::insert(tuple![1i64], T1),
                Change::delete(tuple![1i64], T1),
            ],
        );
        assert!(out.is_empty());
        assert!(store.get(h).is_empty());
    }

    #[test]
    fn test_matches_by_key() {
        let mut store = ArrangementStore::new();
        let h = store.get_or_create(0, KeyProjection::from([0]));
        store.apply(
            h,
            vec![
                Change::insert(tuple![1i64, 10i64], T1),
                Change::insert(tuple![1i64, 11i64], T1),
                Change::insert(tuple![2i64, 20i64], T1),
            ],
        );
        let arr = store.get(h);
        let mut found: Vec<Tuple> = arr.matches(&tuple![1i64]).map(|(t, _, _)| t.clone()).collect();
        found.sort();
        assert_eq!(found, vec![tuple![1i64, 10i64], tuple![1i64, 11i64]]);
        assert_eq!(arr.key_weight(&tuple![1i64]), 2);
        assert_eq!(arr.key_weight(&tuple![3i64]), 0);
        assert_eq!(arr.key_count(), 2);
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_apply_relation_updates_every_index() {
        let mut store = ArrangementStore::new();
        let by_src = store.get_or_create(0, KeyProjection::from([0]));
        let by_dst = store.get_or_create(0, KeyProjection::from([1]));
        store.apply_relation(0, &[Change::insert(tuple![1i64, 2i64], T1)]);
        assert_eq!(store.get(by_src).key_weight(&tuple![1i64]), 1);
        assert_eq!(store.get(by_dst).key_weight(&tuple![2i64]), 1);
    }

    #[test]
    fn test_transition_time_is_latest() {
        let mut store = ArrangementStore::new();
        let h = store.get_or_create(0, KeyProjection::identity(1));
        let later = Timestamp::new(T1.epoch, 3);
        let out = store.apply(
            h,
            vec![Change::insert(tuple![5i64], T1), Change::insert(tuple![5i64], later)],
        );
        assert_eq!(out, vec![Change::new(tuple![5i64], 1, later)]);
        assert_eq!(store.last_update(0, &tuple![5i64]), Some(later));
        assert_eq!(store.last_update(1, &tuple![5i64]), None);
    }
}
