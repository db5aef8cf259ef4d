//! Mutable evaluation state of a program.
//!
//! `DataflowState` owns the per-relation collections, the shared arrangement
//! store and the aggregate groups. The scheduler is the only writer; every
//! write goes through a helper that records the mutation in a [`Journal`].

use crate::arrangement::{ArrangementHandle, ArrangementStore};
use crate::change::{Change, ChangeBatch, Timestamp, Weight};
use crate::collection::Collection;
use crate::dataflow::{Node, NodeId, Program, RelId};
use crate::journal::Journal;
use crate::operators::AggregateState;
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::Tuple;

/// Arrangements read by one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeHandles {
    /// The node reads no arrangement.
    None,
    /// Both sides of a join.
    Join {
        left: ArrangementHandle,
        right: ArrangementHandle,
    },
    /// Both sides of an antijoin.
    Antijoin {
        positive: ArrangementHandle,
        negative: ArrangementHandle,
    },
    /// The aggregate input, arranged by group key.
    Aggregate { input: ArrangementHandle },
}

/// Collections, arrangements and aggregate state of a running program.
#[derive(Clone, Debug)]
pub struct DataflowState {
    collections: Vec<Collection<Tuple>>,
    arrangements: ArrangementStore,
    handles: Vec<NodeHandles>,
    aggregates: HashMap<NodeId, AggregateState>,
}

impl DataflowState {
    /// Creates the empty state of `program`, with one arrangement for every
    /// distinct `(relation, key)` pair its operators read.
    pub fn new(program: &Program) -> Self {
        let mut arrangements = ArrangementStore::new();
        let mut aggregates = HashMap::new();
        let handles = program
            .graph()
            .iter()
            .map(|(id, node)| match node {
                Node::Join {
                    left,
                    left_key,
                    right,
                    right_key,
                    ..
                } => NodeHandles::Join {
                    left: arrangements.get_or_create(*left, left_key.clone()),
                    right: arrangements.get_or_create(*right, right_key.clone()),
                },
                Node::Antijoin {
                    positive,
                    positive_key,
                    negative,
                    negative_key,
                } => NodeHandles::Antijoin {
                    positive: arrangements.get_or_create(*positive, positive_key.clone()),
                    negative: arrangements.get_or_create(*negative, negative_key.clone()),
                },
                Node::Aggregate {
                    input, group_key, ..
                } => {
                    aggregates.insert(id, AggregateState::new());
                    NodeHandles::Aggregate {
                        input: arrangements.get_or_create(*input, group_key.clone()),
                    }
                }
                _ => NodeHandles::None,
            })
            .collect();

        Self {
            collections: (0..program.catalog().len()).map(|_| Collection::new()).collect(),
            arrangements,
            handles,
            aggregates,
        }
    }

    /// Returns the collection of a relation.
    pub fn collection(&self, relation: RelId) -> Option<&Collection<Tuple>> {
        self.collections.get(relation)
    }

    /// Returns the present tuples of a relation in sorted order.
    pub fn contents(&self, relation: RelId) -> Vec<Tuple> {
        self.collections
            .get(relation)
            .map(|c| c.to_sorted_vec())
            .unwrap_or_default()
    }

    /// Returns the arrangement store.
    pub fn arrangements(&self) -> &ArrangementStore {
        &self.arrangements
    }

    /// Returns the arrangements read by a node.
    pub fn handles(&self, node: NodeId) -> NodeHandles {
        self.handles.get(node).copied().unwrap_or(NodeHandles::None)
    }

    /// Returns the state of an aggregate node.
    pub fn aggregate(&self, node: NodeId) -> Option<&AggregateState> {
        self.aggregates.get(&node)
    }

    pub(crate) fn collection_mut(&mut self, relation: RelId) -> &mut Collection<Tuple> {
        &mut self.collections[relation]
    }

    pub(crate) fn arrangements_mut(&mut self) -> &mut ArrangementStore {
        &mut self.arrangements
    }

    pub(crate) fn aggregate_mut(&mut self, node: NodeId) -> &mut AggregateState {
        self.aggregates.entry(node).or_default()
    }

    /// Splits the state into the parts operators read and the parts
    /// aggregates write.
    pub(crate) fn split(
        &mut self,
    ) -> (&ArrangementStore, &[NodeHandles], &mut HashMap<NodeId, AggregateState>) {
        (&self.arrangements, &self.handles, &mut self.aggregates)
    }

    /// Adds `diff` to the derivation count of a tuple.
    pub(crate) fn add_count(
        &mut self,
        relation: RelId,
        tuple: &Tuple,
        diff: Weight,
        journal: &mut Journal,
    ) -> Weight {
        let count = self.collections[relation].add_count(tuple, diff);
        if diff != 0 {
            journal.record_count(relation, tuple.clone(), diff);
        }
        count
    }

    /// Applies presence transitions to a relation and its arrangements.
    ///
    /// Each change must carry weight +1 (becomes present) or -1 (becomes
    /// absent) and must actually flip the tuple's presence.
    pub(crate) fn publish(&mut self, relation: RelId, transitions: &[Change<Tuple>], journal: &mut Journal) {
        if transitions.is_empty() {
            return;
        }
        let collection = &mut self.collections[relation];
        for change in transitions {
            let restore_time = if change.diff < 0 {
                self.arrangements
                    .last_update(relation, &change.data)
                    .unwrap_or(change.time)
            } else {
                change.time
            };
            collection.set_present(&change.data, change.diff > 0);
            journal.record_presence(relation, change.data.clone(), change.diff, restore_time);
        }
        self.arrangements.apply_relation(relation, transitions);
    }

    /// Returns the presence transitions that bring `tuples` in line with
    /// their derivation counts.
    pub(crate) fn pending_transitions<'a, I>(&self, relation: RelId, tuples: I, time: Timestamp) -> ChangeBatch<Tuple>
    where
        I: IntoIterator<Item = &'a Tuple>,
    {
        let collection = &self.collections[relation];
        tuples
            .into_iter()
            .filter_map(|tuple| match collection.pending_transition(tuple) {
                0 => None,
                diff => Some(Change::new(tuple.clone(), diff, time)),
            })
            .collect()
    }
}
