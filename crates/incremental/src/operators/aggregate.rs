//! Incremental grouped aggregation.
//!
//! Each group keeps a running value that is folded forward on every change.
//! Count and integer Sum never need to look back. Min and Max keep the
//! current extremum only, so retracting it forces a refold of the group from
//! the arrangement. Retracting from a float Sum and a custom combinator that
//! fails do the same.

use super::EvalStats;
use crate::arrangement::Arrangement;
use crate::change::{Change, ChangeBatch, Timestamp, Weight};
use crate::dataflow::{CombinatorFn, NodeId};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;
use stratalog_core::{EvalError, KeyProjection, Tuple, Value};

/// Aggregation function applied to every group.
pub enum Aggregator {
    /// Number of tuples in the group.
    Count,
    /// Sum of one numeric column.
    Sum(usize),
    /// Least value of one column.
    Min(usize),
    /// Greatest value of one column.
    Max(usize),
    /// User combinator, called once per change with the change's weight.
    Custom(CombinatorFn),
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregator::Count => f.write_str("Count"),
            Aggregator::Sum(col) => write!(f, "Sum({})", col),
            Aggregator::Min(col) => write!(f, "Min({})", col),
            Aggregator::Max(col) => write!(f, "Max({})", col),
            Aggregator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Result of folding one change into a group value.
enum Step {
    Value(Option<Value>),
    Recompute,
}

impl Aggregator {
    /// Returns the column read by the aggregator, if any.
    pub fn column(&self) -> Option<usize> {
        match self {
            Aggregator::Sum(col) | Aggregator::Min(col) | Aggregator::Max(col) => Some(*col),
            Aggregator::Count | Aggregator::Custom(_) => None,
        }
    }

    fn step(&self, current: Option<&Value>, tuple: &Tuple, weight: Weight) -> Step {
        let column = |col: usize| tuple.get(col).ok_or(EvalError::MissingColumn(col));
        let result = match self {
            Aggregator::Count => return Step::Value(None),
            Aggregator::Sum(col) => {
                let value = match column(*col) {
                    Ok(value) => value,
                    Err(_) => return Step::Recompute,
                };
                // Subtracting a float does not undo adding it
                if weight < 0 && matches!(value, Value::Float(_)) {
                    return Step::Recompute;
                }
                let base = match current {
                    Some(current) => Ok(current.clone()),
                    None => value.zero_like(),
                };
                base.and_then(|base| base.checked_add_scaled(value, weight))
                    .map(Some)
            }
            Aggregator::Min(col) | Aggregator::Max(col) => {
                let value = match column(*col) {
                    Ok(value) => value,
                    Err(_) => return Step::Recompute,
                };
                let keep_current = |current: &Value| match self {
                    Aggregator::Min(_) => current <= value,
                    _ => current >= value,
                };
                if weight > 0 {
                    match current {
                        Some(current) if keep_current(current) => Ok(Some(current.clone())),
                        _ => Ok(Some(value.clone())),
                    }
                } else {
                    match current {
                        // Removing the extremum leaves no way to find the next one
                        Some(current) if current == value => return Step::Recompute,
                        other => Ok(other.cloned()),
                    }
                }
            }
            Aggregator::Custom(combine) => combine(current.cloned(), tuple, weight),
        };
        match result {
            Ok(value) => Step::Value(value),
            Err(_) => Step::Recompute,
        }
    }

    /// Folds every tuple of a group, in tuple order, into a fresh value.
    fn refold(&self, arrangement: &Arrangement, key: &Tuple) -> Result<Option<Value>, EvalError> {
        let mut members: Vec<(&Tuple, Weight)> = arrangement
            .matches(key)
            .map(|(tuple, weight, _)| (tuple, weight))
            .collect();
        members.sort();

        let mut value = None;
        for (tuple, weight) in members {
            value = match self {
                Aggregator::Count => None,
                Aggregator::Sum(col) => {
                    let item = tuple.get(*col).ok_or(EvalError::MissingColumn(*col))?;
                    let base = match value {
                        Some(current) => current,
                        None => item.zero_like()?,
                    };
                    Some(base.checked_add_scaled(item, weight)?)
                }
                Aggregator::Min(col) | Aggregator::Max(col) => {
                    let item = tuple.get(*col).ok_or(EvalError::MissingColumn(*col))?;
                    match value {
                        Some(current) => {
                            let take = match self {
                                Aggregator::Min(_) => item < &current,
                                _ => item > &current,
                            };
                            Some(if take { item.clone() } else { current })
                        }
                        None => Some(item.clone()),
                    }
                }
                Aggregator::Custom(combine) => combine(value, tuple, weight)?,
            };
        }
        Ok(value)
    }
}

/// Running state of one group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupState {
    /// Summed weight of the group's input tuples.
    pub members: Weight,
    /// Running aggregate; unused by `Count`.
    pub value: Option<Value>,
    /// The running value is unknown until the group is refolded.
    pub needs_recompute: bool,
    /// The output tuple currently emitted for the group.
    pub emitted: Option<Tuple>,
}

impl GroupState {
    fn finalize(&self, aggregator: &Aggregator) -> Option<Value> {
        if self.needs_recompute || self.members <= 0 {
            return None;
        }
        match aggregator {
            Aggregator::Count => Some(Value::Int(self.members)),
            _ => self.value.clone(),
        }
    }
}

/// Per-node aggregation state: one entry per non-empty group.
#[derive(Clone, Debug, Default)]
pub struct AggregateState {
    groups: HashMap<Tuple, GroupState>,
}

impl AggregateState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of one group.
    pub fn group(&self, key: &Tuple) -> Option<&GroupState> {
        self.groups.get(key)
    }

    /// Returns the number of live groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is live.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Puts a group back into a previously observed state.
    pub fn restore(&mut self, key: Tuple, previous: Option<GroupState>) {
        match previous {
            Some(state) => {
                self.groups.insert(key, state);
            }
            None => {
                self.groups.remove(&key);
            }
        }
    }

    /// Folds a round of input changes into the affected groups.
    ///
    /// `arrangement` is the input relation arranged by `group_key` and must
    /// already contain `input`. `on_touch` receives every group's state as it
    /// was before the round, so the caller can undo the update. Groups are
    /// processed in key order.
    #[allow(clippy::too_many_arguments)]
    pub fn process<F, T>(
        &mut self,
        node: NodeId,
        aggregator: &Aggregator,
        group_key: &KeyProjection,
        output: F,
        input: &[Change<Tuple>],
        arrangement: &Arrangement,
        stats: &mut EvalStats,
        mut on_touch: T,
    ) -> ChangeBatch<Tuple>
    where
        F: Fn(&Tuple, &Value) -> Result<Tuple, EvalError>,
        T: FnMut(&Tuple, Option<&GroupState>),
    {
        let mut by_group: BTreeMap<Tuple, Vec<&Change<Tuple>>> = BTreeMap::new();
        for change in input {
            by_group
                .entry(change.data.project(group_key))
                .or_default()
                .push(change);
        }

        let mut out = Vec::new();
        for (key, changes) in by_group {
            let previous = self.groups.get(&key);
            on_touch(&key, previous);
            let mut state = previous.cloned().unwrap_or_default();
            let time = changes
                .iter()
                .map(|c| c.time)
                .fold(Timestamp::default(), Timestamp::join);

            for change in &changes {
                if state.needs_recompute {
                    break;
                }
                match aggregator.step(state.value.as_ref(), &change.data, change.diff) {
                    Step::Value(value) => state.value = value,
                    Step::Recompute => state.needs_recompute = true,
                }
            }

            state.members = arrangement.key_weight(&key);
            if state.members > 0 && state.needs_recompute {
                match aggregator.refold(arrangement, &key) {
                    Ok(value) => {
                        state.value = value;
                        state.needs_recompute = false;
                    }
                    Err(error) => {
                        stats.record_failure(node, &error);
                        state.value = None;
                    }
                }
            }

            let next = match state.finalize(aggregator) {
                Some(value) => match output(&key, &value) {
                    Ok(tuple) => Some(tuple),
                    Err(error) => {
                        stats.record_failure(node, &error);
                        None
                    }
                },
                None => None,
            };

            if next != state.emitted {
                if let Some(old) = state.emitted.take() {
                    out.push(Change::delete(old, time));
                }
                if let Some(new) = next.clone() {
                    out.push(Change::insert(new, time));
                }
            }
            state.emitted = next;

            if state.members <= 0 {
                self.groups.remove(&key);
            } else {
                self.groups.insert(key, state);
            }
        }
        out
    }
}
