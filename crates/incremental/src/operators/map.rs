//! Incremental map and flat-map operators.

use super::EvalStats;
use crate::change::{Change, ChangeBatch};
use crate::dataflow::NodeId;
use alloc::vec::Vec;
use stratalog_core::{EvalError, Tuple};

/// Applies a mapper function to a batch of changes.
///
/// Each change is transformed; weight and time are preserved. A mapper error
/// drops the change.
pub fn map_changes<F>(
    node: NodeId,
    input: ChangeBatch<Tuple>,
    mapper: F,
    stats: &mut EvalStats,
) -> ChangeBatch<Tuple>
where
    F: Fn(&Tuple) -> Result<Tuple, EvalError>,
{
    input
        .into_iter()
        .filter_map(|change| match mapper(&change.data) {
            Ok(data) => Some(Change::new(data, change.diff, change.time)),
            Err(error) => {
                stats.record_failure(node, &error);
                None
            }
        })
        .collect()
}

/// Expands each change into zero or more changes.
///
/// Every output inherits the weight and time of the change it came from.
pub fn flat_map_changes<F>(
    node: NodeId,
    input: ChangeBatch<Tuple>,
    expand: F,
    stats: &mut EvalStats,
) -> ChangeBatch<Tuple>
where
    F: Fn(&Tuple) -> Result<Vec<Tuple>, EvalError>,
{
    let mut output = Vec::with_capacity(input.len());
    for change in input {
        match expand(&change.data) {
            Ok(items) => output.extend(
                items
                    .into_iter()
                    .map(|data| Change::new(data, change.diff, change.time)),
            ),
            Err(error) => stats.record_failure(node, &error),
        }
    }
    output
}
