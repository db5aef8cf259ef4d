//! Accumulating relation observer.
//!
//! An `Accumulator` keeps the current contents of one relation by folding in
//! every commit's change set, and forwards each change set to its
//! subscribers. A subscriber that joins late first receives the accumulated
//! contents as one initial change set, so every subscriber's view is the sum
//! of what it was sent.

use crate::change_set::ChangeSet;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use stratalog_core::Tuple;
use stratalog_incremental::RelId;
use tracing::trace;

/// Current state and subscribers of one relation.
#[derive(Debug)]
pub struct Accumulator {
    relation: RelId,
    current: BTreeSet<Tuple>,
    epoch: u64,
    subscriptions: SubscriptionManager,
    completed: bool,
}

impl Accumulator {
    /// Creates an accumulator starting from `initial` at `epoch`.
    pub fn new(relation: RelId, epoch: u64, initial: impl IntoIterator<Item = Tuple>) -> Self {
        Self {
            relation,
            current: initial.into_iter().collect(),
            epoch,
            subscriptions: SubscriptionManager::new(),
            completed: false,
        }
    }

    /// Returns the observed relation.
    pub fn relation(&self) -> RelId {
        self.relation
    }

    /// Returns the epoch of the last change set folded in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the accumulated contents.
    pub fn current(&self) -> &BTreeSet<Tuple> {
        &self.current
    }

    /// Returns true once `complete` has been called.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns the subscriptions.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Adds a subscriber and replays the current contents to it.
    ///
    /// Nothing is replayed when the relation is empty. A completed
    /// accumulator accepts no subscribers and returns false.
    pub fn subscribe<F>(&mut self, id: SubscriptionId, callback: F) -> bool
    where
        F: FnMut(&ChangeSet) + 'static,
    {
        if self.completed {
            return false;
        }
        self.subscriptions.subscribe(id, callback);
        if !self.current.is_empty() {
            let initial = ChangeSet::initial(self.relation, self.epoch, self.current.iter().cloned().collect());
            trace!(relation = self.relation, subscription = id, tuples = initial.len(), "replaying state");
            self.subscriptions.notify(id, &initial);
        }
        true
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    /// Folds a change set into the current contents and forwards it to every
    /// subscriber. Empty change sets only advance the epoch.
    pub fn apply(&mut self, changes: &ChangeSet) {
        if self.completed {
            return;
        }
        self.epoch = changes.epoch;
        if changes.is_empty() {
            return;
        }
        for tuple in &changes.removed {
            self.current.remove(tuple);
        }
        for tuple in &changes.added {
            self.current.insert(tuple.clone());
        }
        trace!(
            relation = self.relation,
            epoch = changes.epoch,
            added = changes.added.len(),
            removed = changes.removed.len(),
            subscribers = self.subscriptions.len(),
            "forwarding changes"
        );
        self.subscriptions.notify_all(changes);
    }

    /// Ends the stream: every subscriber is sent the removal of the current
    /// contents, then all subscriptions are dropped.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let current: Vec<Tuple> = core::mem::take(&mut self.current).into_iter().collect();
        if !current.is_empty() {
            let clearing = ChangeSet::clearing(self.relation, self.epoch, current);
            self.subscriptions.notify_all(&clearing);
        }
        self.subscriptions.clear();
    }
}
