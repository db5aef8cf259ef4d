//! Stratalog Core - Value model and schema definitions for the Stratalog engine.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - `DataType`: Column types (Bool, Int, BigInt, Bits, Float, String, and the
//!   composite Tuple, Variant, Vec, Set, Map and Ref types)
//! - `Value`: Totally ordered, hashable runtime values
//! - `Tuple`: A fixed-arity row of values, and `KeyProjection` to index it
//! - `schema`: Relation definitions and their builder
//! - `InternTable`: Content-addressed value interning
//! - `allocate_ids`: Identifier allocation with partial results
//! - `Error` / `EvalError`: Error types for planning, transactions and evaluation
//!
//! # Example
//!
//! ```rust
//! use stratalog_core::{tuple, DataType, Value};
//! use stratalog_core::schema::RelationBuilder;
//!
//! let edge = RelationBuilder::new("edge")
//!     .unwrap()
//!     .add_column("src", DataType::Int)
//!     .unwrap()
//!     .add_column("dst", DataType::Int)
//!     .unwrap()
//!     .input()
//!     .build()
//!     .unwrap();
//!
//! let t = tuple![1i64, 2i64];
//! assert!(edge.check_tuple(&t).is_ok());
//! assert_eq!(t.get(1), Some(&Value::Int(2)));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod ident;
mod intern;
pub mod schema;
mod tuple;
mod types;
mod value;

pub use error::{Error, EvalError, Result};
pub use ident::allocate_ids;
pub use intern::{InternTable, Interned};
pub use tuple::{KeyProjection, Tuple};
pub use types::{Constructor, DataType};
pub use value::{Shared, Value};

#[doc(hidden)]
pub use alloc::vec as __vec;
