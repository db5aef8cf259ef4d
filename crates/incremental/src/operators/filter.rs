//! Incremental filter operator.

use super::EvalStats;
use crate::change::{Change, ChangeBatch};
use crate::dataflow::NodeId;
use stratalog_core::{EvalError, Tuple};

/// Applies a filter predicate to a batch of changes.
///
/// Only changes whose data satisfies the predicate are passed through, with
/// weight and time preserved. A predicate error drops the change.
///
/// # Example
///
/// ```ignore
/// let changes = vec![Change::insert(tuple![10i64], t), Change::insert(tuple![5i64], t)];
/// let kept = filter_changes(0, changes, |t| Ok(t[0] > Value::Int(8)), &mut stats);
/// // Result: [Change::insert(tuple![10i64], t)]
/// ```
pub fn filter_changes<F>(
    node: NodeId,
    input: ChangeBatch<Tuple>,
    predicate: F,
    stats: &mut EvalStats,
) -> ChangeBatch<Tuple>
where
    F: Fn(&Tuple) -> Result<bool, EvalError>,
{
    input
        .into_iter()
        .filter(|change: &Change<Tuple>| match predicate(&change.data) {
            Ok(keep) => keep,
            Err(error) => {
                stats.record_failure(node, &error);
                false
            }
        })
        .collect()
}
