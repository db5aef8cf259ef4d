//! Undo journal for commits.
//!
//! Every mutation of a [`DataflowState`] during a commit is recorded here.
//! A commit that fails replays the journal backwards, which leaves the state
//! exactly as the previous commit left it.

use crate::change::{Change, Timestamp, Weight};
use crate::dataflow::{NodeId, RelId};
use crate::operators::GroupState;
use crate::state::DataflowState;
use alloc::vec::Vec;
use stratalog_core::Tuple;
use tracing::debug;

/// A single recorded mutation.
#[derive(Clone, Debug)]
pub enum JournalEntry {
    /// A derivation count changed by `diff`.
    Count {
        relation: RelId,
        tuple: Tuple,
        diff: Weight,
    },
    /// A tuple became present (`diff` = 1) or absent (`diff` = -1).
    ///
    /// `time` is the arrangement time to restore when the change is undone.
    Presence {
        relation: RelId,
        tuple: Tuple,
        diff: Weight,
        time: Timestamp,
    },
    /// An aggregate group was updated; `previous` is its prior state.
    Group {
        node: NodeId,
        key: Tuple,
        previous: Option<GroupState>,
    },
}

/// Ordered list of the mutations made by the current commit.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a derivation count change.
    pub fn record_count(&mut self, relation: RelId, tuple: Tuple, diff: Weight) {
        self.entries.push(JournalEntry::Count {
            relation,
            tuple,
            diff,
        });
    }

    /// Records a presence transition.
    pub fn record_presence(&mut self, relation: RelId, tuple: Tuple, diff: Weight, time: Timestamp) {
        self.entries.push(JournalEntry::Presence {
            relation,
            tuple,
            diff,
            time,
        });
    }

    /// Records the state of an aggregate group before an update.
    pub fn record_group(&mut self, node: NodeId, key: Tuple, previous: Option<GroupState>) {
        self.entries.push(JournalEntry::Group {
            node,
            key,
            previous,
        });
    }

    /// Returns the recorded entries, oldest first.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepts every recorded change.
    pub fn commit(&mut self) -> Vec<JournalEntry> {
        core::mem::take(&mut self.entries)
    }

    /// Undoes every recorded change, newest first.
    pub fn rollback(&mut self, state: &mut DataflowState) {
        debug!(entries = self.entries.len(), "rolling back commit");
        while let Some(entry) = self.entries.pop() {
            match entry {
                JournalEntry::Count {
                    relation,
                    tuple,
                    diff,
                } => {
                    state.collection_mut(relation).add_count(&tuple, -diff);
                }
                JournalEntry::Presence {
                    relation,
                    tuple,
                    diff,
                    time,
                } => {
                    state.collection_mut(relation).set_present(&tuple, diff < 0);
                    state
                        .arrangements_mut()
                        .apply_relation(relation, &[Change::new(tuple, -diff, time)]);
                }
                JournalEntry::Group {
                    node,
                    key,
                    previous,
                } => {
                    state.aggregate_mut(node).restore(key, previous);
                }
            }
        }
    }

    /// Discards every recorded entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
