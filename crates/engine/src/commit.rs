//! Result of a committed transaction.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use stratalog_core::Tuple;
use stratalog_incremental::{Change, ChangeBatch, CommitStats, Diagnostic, RelId};

/// What a commit changed.
#[derive(Clone, Debug, Default)]
pub struct Commit {
    /// The epoch assigned to the commit.
    pub epoch: u64,
    /// Net presence changes of every input and output relation that changed,
    /// sorted by tuple. Each change has weight +1 or -1.
    pub changes: BTreeMap<RelId, ChangeBatch<Tuple>>,
    /// Rounds, evaluation failures and emitted changes.
    pub stats: CommitStats,
    /// Failed inspect callbacks.
    pub diagnostics: Vec<Diagnostic>,
}

impl Commit {
    /// Returns the changes of one relation.
    pub fn changes_for(&self, relation: RelId) -> &[Change<Tuple>] {
        self.changes.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the tuples of a relation that became present.
    pub fn added(&self, relation: RelId) -> Vec<&Tuple> {
        self.changes_for(relation)
            .iter()
            .filter(|c| c.is_insert())
            .map(|c| &c.data)
            .collect()
    }

    /// Returns the tuples of a relation that became absent.
    pub fn removed(&self, relation: RelId) -> Vec<&Tuple> {
        self.changes_for(relation)
            .iter()
            .filter(|c| c.is_delete())
            .map(|c| &c.data)
            .collect()
    }

    /// Returns true if no relation changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
