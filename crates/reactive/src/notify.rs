//! Subscription registry and commit routing.
//!
//! This module provides `SubscriptionRegistry`, which owns one
//! [`Accumulator`] per observed relation and routes the net changes of each
//! commit to the accumulators of the relations that changed.

use crate::accumulator::Accumulator;
use crate::change_set::ChangeSet;
use crate::subscription::SubscriptionId;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::Tuple;
use stratalog_incremental::{ChangeBatch, RelId};
use tracing::debug;

/// Routes commit changes to relation observers.
///
/// # Example
///
/// ```rust
/// use stratalog_core::tuple;
/// use stratalog_incremental::{Change, Timestamp};
/// use stratalog_reactive::{ChangeSet, SubscriptionRegistry};
/// use std::collections::BTreeMap;
///
/// let mut registry = SubscriptionRegistry::new();
/// let id = registry.subscribe(0, 0, Vec::new, |changes: &ChangeSet| {
///     assert_eq!(changes.added.len(), 1);
/// });
///
/// let mut commit = BTreeMap::new();
/// commit.insert(0, vec![Change::insert(tuple![1i64], Timestamp::at_epoch(1))]);
/// registry.on_commit(1, &commit);
/// assert!(registry.unsubscribe(id));
/// ```
#[derive(Debug)]
pub struct SubscriptionRegistry {
    /// Relation -> observer
    accumulators: HashMap<RelId, Accumulator>,
    /// Subscription -> observed relation
    owners: HashMap<SubscriptionId, RelId>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates a new subscription registry.
    pub fn new() -> Self {
        Self {
            accumulators: HashMap::new(),
            owners: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to a relation and returns the subscription ID.
    ///
    /// `contents` is only called when the relation has no observer yet, to
    /// seed it with the relation's current state at `epoch`. The callback
    /// then receives that state as its first change set.
    pub fn subscribe<C, F>(&mut self, relation: RelId, epoch: u64, contents: C, callback: F) -> SubscriptionId
    where
        C: FnOnce() -> Vec<Tuple>,
        F: FnMut(&ChangeSet) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let accumulator = self
            .accumulators
            .entry(relation)
            .or_insert_with(|| Accumulator::new(relation, epoch, contents()));
        accumulator.subscribe(id, callback);
        self.owners.insert(id, relation);
        debug!(relation, subscription = id, "subscribed");
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed. A relation
    /// left without subscribers is no longer observed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(relation) = self.owners.remove(&id) else {
            return false;
        };
        if let Some(accumulator) = self.accumulators.get_mut(&relation) {
            accumulator.unsubscribe(id);
            if accumulator.subscriptions().is_empty() {
                self.accumulators.remove(&relation);
            }
        }
        debug!(relation, subscription = id, "unsubscribed");
        true
    }

    /// Routes the net changes of a commit to the observers of the relations
    /// that changed. Relations are notified in ascending id order.
    pub fn on_commit(&mut self, epoch: u64, changes: &BTreeMap<RelId, ChangeBatch<Tuple>>) {
        for (relation, batch) in changes {
            if let Some(accumulator) = self.accumulators.get_mut(relation) {
                accumulator.apply(&ChangeSet::from_changes(*relation, epoch, batch));
            }
        }
    }

    /// Returns the observed contents of a relation.
    pub fn current(&self, relation: RelId) -> Option<&BTreeSet<Tuple>> {
        self.accumulators.get(&relation).map(Accumulator::current)
    }

    /// Returns the relation a subscription observes.
    pub fn relation_of(&self, id: SubscriptionId) -> Option<RelId> {
        self.owners.get(&id).copied()
    }

    /// Returns the number of subscriptions.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns true if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Returns the number of subscriptions to a relation.
    pub fn subscriptions_for(&self, relation: RelId) -> usize {
        self.accumulators
            .get(&relation)
            .map(|a| a.subscriptions().len())
            .unwrap_or(0)
    }

    /// Ends every stream, sending each subscriber the removal of its view,
    /// and drops all subscriptions.
    pub fn complete_all(&mut self) {
        let mut relations: Vec<RelId> = self.accumulators.keys().copied().collect();
        relations.sort_unstable();
        for relation in relations {
            if let Some(mut accumulator) = self.accumulators.remove(&relation) {
                accumulator.complete();
            }
        }
        self.owners.clear();
    }
}
