//! Incremental equi-join operator.

use super::EvalStats;
use crate::arrangement::Arrangement;
use crate::change::{Change, ChangeBatch, Timestamp, Weight};
use crate::dataflow::NodeId;
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::{EvalError, KeyProjection, Tuple};

/// One input of a join: the round's changes and the arrangement of the same
/// relation by the join key.
///
/// The arrangement must already contain `delta`.
#[derive(Clone, Copy)]
pub struct JoinSide<'a> {
    /// Changes of this side during the round.
    pub delta: &'a [Change<Tuple>],
    /// Join key columns of this side.
    pub key: &'a KeyProjection,
    /// Arrangement of this side by `key`, including `delta`.
    pub arrangement: &'a Arrangement,
}

/// Joins the changes of one round against two arrangements.
///
/// With `A` and `B` the contents after the round's changes were applied, the
/// output is `dA ⋈ B + A ⋈ dB - dA ⋈ dB`, which equals the change of `A ⋈ B`.
/// Output weights are the product of the input weights; output time is the
/// later of the two inputs.
pub fn join_changes<F>(
    node: NodeId,
    left: JoinSide<'_>,
    right: JoinSide<'_>,
    combine: F,
    stats: &mut EvalStats,
) -> ChangeBatch<Tuple>
where
    F: Fn(&Tuple, &Tuple) -> Result<Tuple, EvalError>,
{
    let mut output = Vec::new();

    // Left-side changes against the right arrangement
    for change in left.delta {
        let key = change.data.project(left.key);
        for (r, weight, time) in right.arrangement.matches(&key) {
            emit(node, &combine, &change.data, r, change.diff, weight, change.time.join(time), 1, &mut output, stats);
        }
    }

    // Right-side changes against the left arrangement
    for change in right.delta {
        let key = change.data.project(right.key);
        for (l, weight, time) in left.arrangement.matches(&key) {
            emit(node, &combine, l, &change.data, weight, change.diff, change.time.join(time), 1, &mut output, stats);
        }
    }

    // Pairs of changes were counted twice above
    if !left.delta.is_empty() && !right.delta.is_empty() {
        let mut by_key: HashMap<Tuple, Vec<&Change<Tuple>>> = HashMap::new();
        for change in right.delta {
            by_key.entry(change.data.project(right.key)).or_default().push(change);
        }
        for l in left.delta {
            if let Some(matches) = by_key.get(&l.data.project(left.key)) {
                for r in matches {
                    emit(node, &combine, &l.data, &r.data, l.diff, r.diff, l.time.join(r.time), -1, &mut output, stats);
                }
            }
        }
    }

    output
}

#[allow(clippy::too_many_arguments)]
fn emit<F>(
    node: NodeId,
    combine: &F,
    left: &Tuple,
    right: &Tuple,
    left_weight: Weight,
    right_weight: Weight,
    time: Timestamp,
    sign: Weight,
    output: &mut Vec<Change<Tuple>>,
    stats: &mut EvalStats,
) where
    F: Fn(&Tuple, &Tuple) -> Result<Tuple, EvalError>,
{
    let diff = match left_weight
        .checked_mul(right_weight)
        .and_then(|w| w.checked_mul(sign))
    {
        Some(diff) => diff,
        None => return stats.record_failure(node, &EvalError::Overflow),
    };
    match combine(left, right) {
        Ok(data) => output.push(Change::new(data, diff, time)),
        Err(error) => stats.record_failure(node, &error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::ArrangementStore;
    use crate::change::ChangeBatchExt;
    use alloc::vec;
    use stratalog_core::tuple;

    const T: Timestamp = Timestamp::at_epoch(1);

    fn concat(l: &Tuple, r: &Tuple) -> Result<Tuple, EvalError> {
        Ok(l.concat(r))
    }

    // emp(id, dept) ⋈ dept(id, name) on emp.dept = dept.id
    fn setup(
        emp: &[Tuple],
        dept: &[Tuple],
    ) -> (ArrangementStore, crate::arrangement::ArrangementHandle, crate::arrangement::ArrangementHandle) {
        let mut store = ArrangementStore::new();
        let e = store.get_or_create(0, KeyProjection::from([1]));
        let d = store.get_or_create(1, KeyProjection::from([0]));
        store.apply(e, emp.iter().cloned().map(|t| Change::insert(t, T)).collect());
        store.apply(d, dept.iter().cloned().map(|t| Change::insert(t, T)).collect());
        (store, e, d)
    }

    #[test]
    fn test_left_insert_matches_right() {
        let (store, e, d) = setup(
            &[tuple![1i64, 10i64]],
            &[tuple![10i64, "eng"], tuple![20i64, "ops"]],
        );
        let delta = vec![Change::insert(tuple![1i64, 10i64], T)];
        let mut stats = EvalStats::default();
        let out = join_changes(
            0,
            JoinSide { delta: &delta, key: &KeyProjection::from([1]), arrangement: store.get(e) },
            JoinSide { delta: &[], key: &KeyProjection::from([0]), arrangement: store.get(d) },
            concat,
            &mut stats,
        );
        assert_eq!(out, vec![Change::insert(tuple![1i64, 10i64, 10i64, "eng"], T)]);
    }

    #[test]
    fn test_both_sides_inserted_in_same_round() {
        let (store, e, d) = setup(&[tuple![1i64, 10i64]], &[tuple![10i64, "eng"]]);
        let emp_delta = vec![Change::insert(tuple![1i64, 10i64], T)];
        let dept_delta = vec![Change::insert(tuple![10i64, "eng"], T)];
        let mut stats = EvalStats::default();
        let out = join_changes(
            0,
            JoinSide { delta: &emp_delta, key: &KeyProjection::from([1]), arrangement: store.get(e) },
            JoinSide { delta: &dept_delta, key: &KeyProjection::from([0]), arrangement: store.get(d) },
            concat,
            &mut stats,
        )
        .consolidate();
        assert_eq!(out, vec![Change::insert(tuple![1i64, 10i64, 10i64, "eng"], T)]);
    }

    #[test]
    fn test_right_delete_retracts_pairs() {
        // Arrangements reflect the state after the department was removed.
        let (store, e, d) = setup(&[tuple![1i64, 10i64], tuple![2i64, 10i64]], &[]);
        let dept_delta = vec![Change::delete(tuple![10i64, "eng"], T)];
        let mut stats = EvalStats::default();
        let out = join_changes(
            0,
            JoinSide { delta: &[], key: &KeyProjection::from([1]), arrangement: store.get(e) },
            JoinSide { delta: &dept_delta, key: &KeyProjection::from([0]), arrangement: store.get(d) },
            concat,
            &mut stats,
        )
        .consolidate();
        assert_eq!(
            out,
            vec![
                Change::delete(tuple![1i64, 10i64, 10i64, "eng"], T),
                Change::delete(tuple![2i64, 10i64, 10i64, "eng"], T),
            ]
        );
    }

    #[test]
    fn test_simultaneous_deletes_retract_once() {
        let (store, e, d) = setup(&[], &[]);
        let emp_delta = vec![Change::delete(tuple![1i64, 10i64], T)];
        let dept_delta = vec![Change::delete(tuple![10i64, "eng"], T)];
        let mut stats = EvalStats::default();
        let out = join_changes(
            0,
            JoinSide { delta: &emp_delta, key: &KeyProjection::from([1]), arrangement: store.get(e) },
            JoinSide { delta: &dept_delta, key: &KeyProjection::from([0]), arrangement: store.get(d) },
            concat,
            &mut stats,
        );
        assert_eq!(out.consolidate(), vec![Change::delete(tuple![1i64, 10i64, 10i64, "eng"], T)]);
    }

    #[test]
    fn test_combine_error_counted() {
        let (store, e, d) = setup(&[tuple![1i64, 10i64]], &[tuple![10i64, "eng"]]);
        let delta = vec![Change::insert(tuple![1i64, 10i64], T)];
        let mut stats = EvalStats::default();
        let out = join_changes(
            4,
            JoinSide { delta: &delta, key: &KeyProjection::from([1]), arrangement: store.get(e) },
            JoinSide { delta: &[], key: &KeyProjection::from([0]), arrangement: store.get(d) },
            |_, _| Err(EvalError::user("no")),
            &mut stats,
        );
        assert!(out.is_empty());
        assert_eq!(stats.eval_failures, 1);
    }

    #[test]
    fn test_output_time_is_latest_input() {
        let mut store = ArrangementStore::new();
        let l = store.get_or_create(0, KeyProjection::from([0]));
        let r = store.get_or_create(1, KeyProjection::from([0]));
        let later = Timestamp::new(T.epoch, 5);
        store.apply(r, vec![Change::insert(tuple![1i64], later)]);
        let delta = vec![Change::insert(tuple![1i64], T)];
        store.apply(l, delta.clone());
        let mut stats = EvalStats::default();
        let out = join_changes(
            0,
            JoinSide { delta: &delta, key: &KeyProjection::from([0]), arrangement: store.get(l) },
            JoinSide { delta: &[], key: &KeyProjection::from([0]), arrangement: store.get(r) },
            concat,
            &mut stats,
        );
        assert_eq!(out[0].time, later);
    }
}
