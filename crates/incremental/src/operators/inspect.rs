//! Pass-through observation of changes.

use crate::change::{Change, ChangeBatch, Timestamp};
use crate::dataflow::NodeId;
use alloc::string::String;
use alloc::vec::Vec;
use stratalog_core::{EvalError, Tuple};
use tracing::warn;

/// Receives every change flowing through an inspect node.
pub trait InspectSink: Send + Sync {
    /// Observes one change. An error is reported, never propagated.
    fn inspect(&self, change: &Change<Tuple>) -> Result<(), EvalError>;
}

impl<F> InspectSink for F
where
    F: Fn(&Change<Tuple>) -> Result<(), EvalError> + Send + Sync,
{
    fn inspect(&self, change: &Change<Tuple>) -> Result<(), EvalError> {
        self(change)
    }
}

/// A failed inspect callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The inspect node that failed.
    pub node: NodeId,
    /// Time of the change being inspected.
    pub time: Timestamp,
    /// The error message.
    pub message: String,
}

/// Hands every change to `sink` and returns the batch unchanged.
pub fn inspect_changes(
    node: NodeId,
    input: ChangeBatch<Tuple>,
    sink: &dyn InspectSink,
    diagnostics: &mut Vec<Diagnostic>,
) -> ChangeBatch<Tuple> {
    for change in &input {
        if let Err(error) = sink.inspect(change) {
            warn!(node, %error, "inspect callback failed");
            diagnostics.push(Diagnostic {
                node,
                time: change.time,
                message: alloc::format!("{}", error),
            });
        }
    }
    input
}
