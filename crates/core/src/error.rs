//! Error types for the Stratalog engine.
//!
//! Two families live here. [`Error`] is returned from the public API and is
//! fatal for the operation that produced it: a program that fails planning is
//! never instantiated, and a commit that fails is rolled back. [`EvalError`] is
//! raised by user expressions while a rule is evaluated; it never escapes an
//! operator and only suppresses the output that raised it.

use crate::types::DataType;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;

/// Result type alias for Stratalog operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for planning, transactions and evaluation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// A relation depends on itself through negation or aggregation.
    #[error("Stratification error: cycle through negation or aggregation involving {}", .cycle.join(", "))]
    Stratification { cycle: Vec<String> },

    /// A key projection refers to a column outside the relation's arity, or
    /// the two sides of a join disagree on key length.
    #[error("Invalid projection on {relation}: {message}")]
    InvalidProjection { relation: String, message: String },

    /// The operator graph or rule set is malformed.
    #[error("Invalid plan: {message}")]
    InvalidPlan { message: String },

    /// Invalid relation schema definition.
    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    /// Relation not found.
    #[error("Relation not found: {name}")]
    UnknownRelation { name: String },

    /// Only input relations accept updates from a transaction.
    #[error("Relation {name} is derived and cannot be updated directly")]
    NotAnInput { name: String },

    /// A tuple does not conform to the relation schema.
    #[error("Type mismatch in {relation} column {column}: expected {expected:?}")]
    TypeMismatch {
        relation: String,
        column: usize,
        expected: DataType,
    },

    /// A tuple has the wrong number of columns.
    #[error("Arity mismatch in {relation}: expected {expected} columns, got {got}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        got: usize,
    },

    /// A recursive stratum failed to converge within the iteration limit.
    #[error("Stratum {stratum} did not converge after {iterations} iterations")]
    Divergence { stratum: usize, iterations: u32 },

    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a stratification error naming the offending relations.
    pub fn stratification(cycle: Vec<String>) -> Self {
        Error::Stratification { cycle }
    }

    /// Creates an invalid projection error.
    pub fn invalid_projection(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidProjection {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid plan error.
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Error::InvalidPlan {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an unknown relation error.
    pub fn unknown_relation(name: impl Into<String>) -> Self {
        Error::UnknownRelation { name: name.into() }
    }

    /// Creates a not-an-input error.
    pub fn not_an_input(name: impl Into<String>) -> Self {
        Error::NotAnInput { name: name.into() }
    }

    /// Creates a divergence error.
    pub fn divergence(stratum: usize, iterations: u32) -> Self {
        Error::Divergence {
            stratum,
            iterations,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors detected while building a program.
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Error::Stratification { .. }
                | Error::InvalidProjection { .. }
                | Error::InvalidPlan { .. }
                | Error::InvalidSchema { .. }
        )
    }
}

/// A failure raised while evaluating a user expression.
///
/// The operator that observes one drops the offending output and counts it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,
    /// Arithmetic was applied to values of incompatible types.
    #[error("incompatible operands: {0}")]
    Incompatible(String),
    /// A variant value did not have the expected constructor.
    #[error("pattern mismatch: expected constructor {expected}")]
    PatternMismatch { expected: String },
    /// A column index was out of bounds for the tuple.
    #[error("column {0} out of bounds")]
    MissingColumn(usize),
    /// A produced tuple does not fit the schema of its target relation.
    #[error("schema violation: {0}")]
    Schema(String),
    /// A failure reported by user code.
    #[error("{0}")]
    User(String),
}

impl EvalError {
    /// Creates a user-defined evaluation error.
    pub fn user(message: impl Into<String>) -> Self {
        EvalError::User(message.into())
    }

    /// Creates an incompatible operands error.
    pub fn incompatible(message: impl Into<String>) -> Self {
        EvalError::Incompatible(message.into())
    }
}
