//! Operator graphs and programs.
//!
//! Operators live in an arena ([`OperatorGraph`]) and refer to each other by
//! [`NodeId`]. A [`Program`] ties the graph to a relation [`Catalog`] and a set
//! of [`Rule`]s, each routing the output of one node into one relation.

mod graph;
pub mod node;
mod program;

pub use graph::OperatorGraph;
pub use node::{
    CombineFn, CombinatorFn, FlatMapFn, MapFn, Node, NodeId, OutputFn, Polarity, PredicateFn, RelId,
};
pub use program::{Catalog, Program, ProgramBuilder, Rule};
