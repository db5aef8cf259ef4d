//! Stratalog Engine - Transactional incremental Datalog evaluation.
//!
//! This crate ties a stratified program to its evaluation state:
//!
//! - `Engine`: Owns the program, runs commits and routes changes to subscribers
//! - `Transaction`: A batch of weighted updates to input relations
//! - `Commit`: The net changes, statistics and diagnostics of one commit
//! - `EngineConfig`: Iteration limit and diagnostics collection
//!
//! Programs are described with [`ProgramBuilder`] and stratified when built.
//! Commits are atomic: a commit that fails (for instance because a recursive
//! stratum does not converge) leaves no trace.

#![no_std]

extern crate alloc;

mod commit;
mod config;
mod engine;
mod transaction;

pub use commit::Commit;
pub use config::EngineConfig;
pub use engine::Engine;
pub use transaction::{Transaction, TransactionId, TransactionState};

// Re-export commonly used types from dependencies
pub use stratalog_core::{allocate_ids, Error, EvalError, Interned, Result, Tuple, Value};
pub use stratalog_incremental::{
    Aggregator, Change, CommitStats, Diagnostic, Program, ProgramBuilder, RelId, StratumState,
};
pub use stratalog_reactive::{ChangeSet, SubscriptionId};
