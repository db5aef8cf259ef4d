//! Operator node definitions.

use crate::change::Weight;
use crate::operators::{Aggregator, InspectSink};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use stratalog_core::{EvalError, KeyProjection, Tuple, Value};

/// Index of a relation in the program catalog.
pub type RelId = usize;

/// Index of a node in the operator graph.
pub type NodeId = usize;

/// Tuple transformation.
pub type MapFn = Box<dyn Fn(&Tuple) -> Result<Tuple, EvalError> + Send + Sync>;

/// Tuple predicate.
pub type PredicateFn = Box<dyn Fn(&Tuple) -> Result<bool, EvalError> + Send + Sync>;

/// One-to-many tuple expansion.
pub type FlatMapFn = Box<dyn Fn(&Tuple) -> Result<Vec<Tuple>, EvalError> + Send + Sync>;

/// Builds a join output from the matching left and right tuples.
pub type CombineFn = Box<dyn Fn(&Tuple, &Tuple) -> Result<Tuple, EvalError> + Send + Sync>;

/// Builds an aggregate output from the group key and the aggregate value.
pub type OutputFn = Box<dyn Fn(&Tuple, &Value) -> Result<Tuple, EvalError> + Send + Sync>;

/// Folds one weighted tuple into an accumulator.
pub type CombinatorFn =
    Box<dyn Fn(Option<Value>, &Tuple, Weight) -> Result<Option<Value>, EvalError> + Send + Sync>;

/// How a node reads a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// Monotone read: more input never means less output.
    Positive,
    /// Negated or aggregated read.
    Negative,
}

/// A node of the operator graph.
///
/// Children always have a smaller id than their parent, so the graph is
/// acyclic by construction. Joins, antijoins and aggregates read relations
/// directly through arrangements.
pub enum Node {
    /// Changes of a relation.
    Scan { relation: RelId },

    /// Per-change transformation.
    Map { input: NodeId, f: MapFn },

    /// Per-change predicate.
    Filter {
        input: NodeId,
        predicate: PredicateFn,
    },

    /// Per-change expansion into any number of tuples.
    FlatMap { input: NodeId, f: FlatMapFn },

    /// Equi-join of two relations.
    Join {
        left: RelId,
        left_key: KeyProjection,
        right: RelId,
        right_key: KeyProjection,
        combine: CombineFn,
    },

    /// Tuples of `positive` whose key is absent from `negative`.
    Antijoin {
        positive: RelId,
        positive_key: KeyProjection,
        negative: RelId,
        negative_key: KeyProjection,
    },

    /// Grouped aggregation of a relation.
    Aggregate {
        input: RelId,
        group_key: KeyProjection,
        aggregator: Aggregator,
        output: OutputFn,
    },

    /// Pass-through observation.
    Inspect {
        input: NodeId,
        sink: Box<dyn InspectSink>,
    },
}

impl Node {
    /// Returns the operator name.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scan { .. } => "scan",
            Node::Map { .. } => "map",
            Node::Filter { .. } => "filter",
            Node::FlatMap { .. } => "flat_map",
            Node::Join { .. } => "join",
            Node::Antijoin { .. } => "antijoin",
            Node::Aggregate { .. } => "aggregate",
            Node::Inspect { .. } => "inspect",
        }
    }

    /// Returns the child node, if any.
    pub fn input(&self) -> Option<NodeId> {
        match self {
            Node::Map { input, .. }
            | Node::Filter { input, .. }
            | Node::FlatMap { input, .. }
            | Node::Inspect { input, .. } => Some(*input),
            _ => None,
        }
    }

    /// Returns the relations read directly by this node.
    pub fn relations(&self) -> Vec<(RelId, Polarity)> {
        match self {
            Node::Scan { relation } => vec![(*relation, Polarity::Positive)],
            Node::Join { left, right, .. } => {
                vec![(*left, Polarity::Positive), (*right, Polarity::Positive)]
            }
            Node::Antijoin { positive, negative, .. } => {
                vec![(*positive, Polarity::Positive), (*negative, Polarity::Negative)]
            }
            Node::Aggregate { input, .. } => vec![(*input, Polarity::Negative)],
            Node::Map { .. } | Node::Filter { .. } | Node::FlatMap { .. } | Node::Inspect { .. } => {
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Scan { relation } => f.debug_struct("Scan").field("relation", relation).finish(),
            Node::Map { input, .. } => f.debug_struct("Map").field("input", input).finish(),
            Node::Filter { input, .. } => f.debug_struct("Filter").field("input", input).finish(),
            Node::FlatMap { input, .. } => f.debug_struct("FlatMap").field("input", input).finish(),
            Node::Join {
                left,
                left_key,
                right,
                right_key,
                ..
            } => f
                .debug_struct("Join")
                .field("left", left)
                .field("left_key", left_key)
                .field("right", right)
                .field("right_key", right_key)
                .finish(),
            Node::Antijoin {
                positive,
                positive_key,
                negative,
                negative_key,
            } => f
                .debug_struct("Antijoin")
                .field("positive", positive)
                .field("positive_key", positive_key)
                .field("negative", negative)
                .field("negative_key", negative_key)
                .finish(),
            Node::Aggregate {
                input,
                group_key,
                aggregator,
                ..
            } => f
                .debug_struct("Aggregate")
                .field("input", input)
                .field("group_key", group_key)
                .field("aggregator", aggregator)
                .finish(),
            Node::Inspect { input, .. } => f.debug_struct("Inspect").field("input", input).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_and_polarity() {
        let scan = Node::Scan { relation: 2 };
        assert_eq!(scan.relations(), vec![(2, Polarity::Positive)]);
        assert_eq!(scan.input(), None);

        let anti = Node::Antijoin {
            positive: 0,
            positive_key: KeyProjection::from([0]),
            negative: 1,
            negative_key: KeyProjection::from([0]),
        };
        assert_eq!(
            anti.relations(),
            vec![(0, Polarity::Positive), (1, Polarity::Negative)]
        );

        let agg = Node::Aggregate {
            input: 3,
            group_key: KeyProjection::from([0]),
            aggregator: Aggregator::Count,
            output: Box::new(|k: &Tuple, v: &Value| {
                Ok::<_, EvalError>(k.concat(&Tuple::new(vec![v.clone()])))
            }),
        };
        assert_eq!(agg.relations(), vec![(3, Polarity::Negative)]);
        assert_eq!(agg.kind(), "aggregate");
    }

    #[test]
    fn test_unary_input() {
        let filter = Node::Filter {
            input: 4,
            predicate: Box::new(|_: &Tuple| Ok::<_, EvalError>(true)),
        };
        assert_eq!(filter.input(), Some(4));
        assert!(filter.relations().is_empty());
    }
}
