//! Relation definition for program schemas.

use super::column::Column;
use crate::error::{Error, Result};
use crate::tuple::Tuple;
use crate::types::DataType;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// How a relation participates in a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelationRole {
    /// Updated only by transactions; never the head of a rule.
    Input,
    /// Derived by rules and reported to the host after each commit.
    Output,
    /// Derived by rules; visible only to other rules.
    Internal,
}

impl RelationRole {
    /// Returns true if changes to the relation are reported to the host.
    pub fn is_observable(self) -> bool {
        !matches!(self, RelationRole::Internal)
    }
}

/// A relation definition in a program schema.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// Relation name.
    name: String,
    /// Column definitions.
    columns: Vec<Column>,
    /// Role of the relation.
    role: RelationRole,
}

impl Relation {
    /// Creates a new relation with the given name, columns and role.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, role: RelationRole) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_index(i))
            .collect();
        Self {
            name: name.into(),
            columns,
            role,
        }
    }

    /// Returns the relation name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of columns.
    #[inline]
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Returns the relation role.
    #[inline]
    pub fn role(&self) -> RelationRole {
        self.role
    }

    /// Returns true if this is an input relation.
    #[inline]
    pub fn is_input(&self) -> bool {
        self.role == RelationRole::Input
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Gets a column index by name.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Checks that `tuple` has this relation's arity and column types.
    pub fn check_tuple(&self, tuple: &Tuple) -> Result<()> {
        if tuple.arity() != self.arity() {
            return Err(Error::ArityMismatch {
                relation: self.name.clone(),
                expected: self.arity(),
                got: tuple.arity(),
            });
        }
        for (column, value) in self.columns.iter().zip(tuple.values()) {
            if !column.data_type().matches(value) {
                return Err(Error::TypeMismatch {
                    relation: self.name.clone(),
                    column: column.index(),
                    expected: column.data_type().clone(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for creating relation definitions.
pub struct RelationBuilder {
    name: String,
    columns: Vec<Column>,
    role: RelationRole,
}

impl RelationBuilder {
    /// Creates a new relation builder. Relations default to `Internal`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            role: RelationRole::Internal,
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err(Error::invalid_schema("Name cannot be empty")),
        };
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter or underscore: {}",
                name
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    /// Adds a column to the relation.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        if self.columns.iter().any(|c| c.name() == name) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                name
            )));
        }
        if let DataType::Bits(width) = data_type {
            if width == 0 || width > 128 {
                return Err(Error::invalid_schema(format!(
                    "Bit width must be between 1 and 128: {}",
                    name
                )));
            }
        }
        self.columns.push(Column::new(name, data_type));
        Ok(self)
    }

    /// Sets the relation role.
    pub fn role(mut self, role: RelationRole) -> Self {
        self.role = role;
        self
    }

    /// Marks the relation as an input relation.
    pub fn input(self) -> Self {
        self.role(RelationRole::Input)
    }

    /// Marks the relation as an output relation.
    pub fn output(self) -> Self {
        self.role(RelationRole::Output)
    }

    /// Builds the relation definition.
    pub fn build(self) -> Result<Relation> {
        Ok(Relation::new(self.name, self.columns, self.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::tuple;

    fn edge() -> Relation {
        RelationBuilder::new("edge")
            .unwrap()
            .add_column("src", DataType::Int)
            .unwrap()
            .add_column("dst", DataType::Int)
            .unwrap()
            .input()
            .build()
            .unwrap()
    }

    #[test]
    fn test_relation_builder() {
        let rel = edge();
        assert_eq!(rel.name(), "edge");
        assert_eq!(rel.arity(), 2);
        assert!(rel.is_input());
        assert_eq!(rel.get_column_index("dst"), Some(1));
        assert_eq!(rel.get_column("dst").map(|c| c.index()), Some(1));
    }

    #[test]
    fn test_invalid_relation_name() {
        assert!(RelationBuilder::new("").is_err());
        assert!(RelationBuilder::new("1edge").is_err());
        assert!(RelationBuilder::new("edge-list").is_err());
        assert!(RelationBuilder::new("_edge").is_ok());
    }

    #[test]
    fn test_duplicate_column() {
        let result = RelationBuilder::new("t")
            .unwrap()
            .add_column("a", DataType::Int)
            .unwrap()
            .add_column("a", DataType::String);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_bit_width() {
        let result = RelationBuilder::new("t").unwrap().add_column("b", DataType::Bits(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_check_tuple() {
        let rel = edge();
        assert!(rel.check_tuple(&tuple![1i64, 2i64]).is_ok());
        assert!(matches!(
            rel.check_tuple(&tuple![1i64]),
            Err(Error::ArityMismatch { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            rel.check_tuple(&tuple![1i64, "x"]),
            Err(Error::TypeMismatch { column: 1, .. })
        ));
        assert!(matches!(
            rel.check_tuple(&Tuple::new(alloc::vec![Value::Int(1), Value::BigInt(2)])),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_role_observable() {
        assert!(RelationRole::Input.is_observable());
        assert!(RelationRole::Output.is_observable());
        assert!(!RelationRole::Internal.is_observable());
    }
}
