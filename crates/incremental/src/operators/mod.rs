//! Incremental operators.
//!
//! Every operator turns the changes of one round into output changes. They
//! read arrangements but never mutate them:
//! - Map / Filter / FlatMap: per-change transformations
//! - Join: equi-join of two arranged relations
//! - Antijoin: changes of one relation whose key is absent from another
//! - Aggregate: grouped Count / Sum / Min / Max / custom combinators
//! - Inspect: pass-through observation of the changes flowing by

mod aggregate;
mod antijoin;
mod filter;
mod inspect;
mod join;
mod map;

pub use aggregate::{AggregateState, Aggregator, GroupState};
pub use antijoin::antijoin_changes;
pub use filter::filter_changes;
pub use inspect::{inspect_changes, Diagnostic, InspectSink};
pub use join::{join_changes, JoinSide};
pub use map::{flat_map_changes, map_changes};

use crate::dataflow::NodeId;
use stratalog_core::EvalError;
use tracing::trace;

/// Counters collected while operators evaluate user expressions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Outputs dropped because an expression failed.
    pub eval_failures: u64,
}

impl EvalStats {
    /// Records an expression failure at `node`; the output is dropped.
    pub fn record_failure(&mut self, node: NodeId, error: &EvalError) {
        self.eval_failures += 1;
        trace!(node, %error, "expression failed, output dropped");
    }
}
