//! Schema module.
//!
//! This module contains the relation schema definitions: columns, relation
//! roles and the builder used to declare relations.

mod column;
mod relation;

pub use column::Column;
pub use relation::{Relation, RelationBuilder, RelationRole};
