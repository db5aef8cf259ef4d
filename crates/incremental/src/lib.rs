//! Stratalog Incremental - Incremental evaluation of stratified Datalog programs.
//!
//! This crate keeps the derived relations of a program up to date as input
//! relations change. Work per commit is proportional to what changed, not to
//! the size of the database.
//!
//! # Core Concepts
//!
//! - `Change<T>`: A weighted change to a datum, stamped with a `Timestamp`
//! - `Collection<T>`: Derivation counts and presence of a relation's tuples
//! - `Arrangement`: A relation indexed by a key, shared between operators
//! - `Program`: Relations, an operator graph and the rules tying them together
//! - `Plan`: The program's strata in evaluation order
//! - `Scheduler`: Drives every stratum to a fixpoint for one commit
//! - `Journal`: Undo log that makes a failed commit leave no trace
//!
//! # Incremental Operators
//!
//! - `map_changes` / `filter_changes` / `flat_map_changes`: Per-change transforms
//! - `join_changes`: Equi-join against arrangements
//! - `antijoin_changes`: Changes whose key is absent from another relation
//! - `AggregateState`: Grouped Count / Sum / Min / Max / custom combinators
//! - `inspect_changes`: Pass-through observation
//!
//! # Example
//!
//! ```rust
//! use stratalog_core::{tuple, DataType, Tuple};
//! use stratalog_core::schema::RelationBuilder;
//! use stratalog_incremental::{DataflowState, Journal, ProgramBuilder, Scheduler};
//!
//! let mut builder = ProgramBuilder::new();
//! let edge = builder
//!     .relation(
//!         RelationBuilder::new("edge").unwrap()
//!             .add_column("src", DataType::Int).unwrap()
//!             .add_column("dst", DataType::Int).unwrap()
//!             .input()
//!             .build().unwrap(),
//!     )
//!     .unwrap();
//! let path = builder
//!     .relation(
//!         RelationBuilder::new("path").unwrap()
//!             .add_column("src", DataType::Int).unwrap()
//!             .add_column("dst", DataType::Int).unwrap()
//!             .output()
//!             .build().unwrap(),
//!     )
//!     .unwrap();
//!
//! let base = builder.scan(edge).unwrap();
//! builder.rule(path, base).unwrap();
//! let step = builder
//!     .join_with(path, [1], edge, [0], |p: &Tuple, e: &Tuple| {
//!         Ok(Tuple::new(vec![p[0].clone(), e[1].clone()]))
//!     })
//!     .unwrap();
//! builder.rule(path, step).unwrap();
//! let program = builder.build().unwrap();
//!
//! let mut state = DataflowState::new(&program);
//! let mut journal = Journal::new();
//! let inputs = [(edge, tuple![1i64, 2i64], 1), (edge, tuple![2i64, 3i64], 1)];
//! let outcome = Scheduler::new()
//!     .run(&program, &mut state, &mut journal, 1, &inputs)
//!     .unwrap();
//! journal.commit();
//!
//! assert_eq!(outcome.changes[&path].len(), 3);
//! assert_eq!(state.contents(path).len(), 3);
//! ```

#![no_std]

extern crate alloc;

pub mod arrangement;
pub mod change;
pub mod collection;
pub mod dataflow;
pub mod journal;
pub mod operators;
pub mod planner;
pub mod scheduler;
pub mod state;

pub use arrangement::{Arrangement, ArrangementHandle, ArrangementStore};
pub use change::{Change, ChangeBatch, ChangeBatchExt, Timestamp, Weight};
pub use collection::Collection;
pub use dataflow::{Catalog, Node, NodeId, OperatorGraph, Polarity, Program, ProgramBuilder, RelId, Rule};
pub use journal::{Journal, JournalEntry};
pub use operators::{
    antijoin_changes, filter_changes, flat_map_changes, inspect_changes, join_changes, map_changes,
    AggregateState, Aggregator, Diagnostic, EvalStats, GroupState, InspectSink, JoinSide,
};
pub use planner::{Plan, Stratum};
pub use scheduler::{
    CommitStats, Outcome, Scheduler, StratumReport, StratumState, DEFAULT_ITERATION_LIMIT,
};
pub use state::{DataflowState, NodeHandles};
