//! Tuple structure for relation contents.
//!
//! This module defines `Tuple`, a fixed-arity row of values, and
//! `KeyProjection`, the ordered column selection used to index tuples.

use crate::value::Value;
use alloc::vec::Vec;
use core::ops::Index;

/// A tuple of a relation.
///
/// Tuples compare, order and hash structurally by their values.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    /// Creates a tuple from its values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the tuple and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the number of columns.
    #[inline]
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this tuple has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Extracts the key columns named by `projection`.
    ///
    /// Columns beyond the tuple's arity are skipped; projections are validated
    /// against relation arity when a program is built.
    pub fn project(&self, projection: &KeyProjection) -> Tuple {
        Tuple::new(
            projection
                .columns()
                .iter()
                .filter_map(|&col| self.values.get(col).cloned())
                .collect(),
        )
    }

    /// Returns a new tuple holding this tuple's columns followed by `other`'s.
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut values = Vec::with_capacity(self.arity() + other.arity());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Tuple::new(values)
    }
}

impl Index<usize> for Tuple {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<Value> for Tuple {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Builds a tuple from a list of expressions convertible into `Value`.
///
/// ```rust
/// use stratalog_core::{tuple, Value};
///
/// let t = tuple![1i64, "a"];
/// assert_eq!(t.get(1), Some(&Value::from("a")));
/// ```
#[macro_export]
macro_rules! tuple {
    ($($value:expr),* $(,)?) => {
        $crate::Tuple::new($crate::__vec![$($crate::Value::from($value)),*])
    };
}

/// An ordered list of column indices selecting a key from a tuple.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyProjection {
    columns: Vec<usize>,
}

impl KeyProjection {
    /// Creates a projection over the given columns.
    pub fn new(columns: impl Into<Vec<usize>>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// The identity projection over `arity` columns.
    pub fn identity(arity: usize) -> Self {
        Self::new((0..arity).collect::<Vec<_>>())
    }

    /// Returns the selected columns.
    #[inline]
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Returns the number of key columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the projection selects no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the first column index that does not fit `arity`.
    pub fn out_of_range(&self, arity: usize) -> Option<usize> {
        self.columns.iter().copied().find(|&col| col >= arity)
    }
}

impl From<&[usize]> for KeyProjection {
    fn from(columns: &[usize]) -> Self {
        Self::new(columns.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for KeyProjection {
    fn from(columns: [usize; N]) -> Self {
        Self::new(columns.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_tuple_new() {
        let t = Tuple::new(vec![Value::Int(42), Value::from("Alice")]);
        assert_eq!(t.arity(), 2);
        assert_eq!(t.get(0), Some(&Value::Int(42)));
        assert_eq!(t.get(2), None);
    }

    #[test]
    fn test_tuple_macro() {
        let t = tuple![1i64, "x", true];
        assert_eq!(t, Tuple::new(vec![Value::Int(1), Value::from("x"), Value::Bool(true)]));
    }

    #[test]
    fn test_tuple_project() {
        let t = tuple![1i64, 2i64, 3i64];
        assert_eq!(t.project(&KeyProjection::from([2, 0])), tuple![3i64, 1i64]);
        assert_eq!(t.project(&KeyProjection::default()), Tuple::default());
    }

    #[test]
    fn test_tuple_concat() {
        let t = tuple![1i64].concat(&tuple!["a", "b"]);
        assert_eq!(t, tuple![1i64, "a", "b"]);
    }

    #[test]
    fn test_tuple_ordering() {
        assert!(tuple![1i64, 2i64] < tuple![1i64, 3i64]);
        assert!(tuple![1i64] < tuple![1i64, 0i64]);
    }

    #[test]
    fn test_projection_range() {
        let p = KeyProjection::from([0, 3]);
        assert_eq!(p.out_of_range(3), Some(3));
        assert_eq!(p.out_of_range(4), None);
        assert_eq!(KeyProjection::identity(3).columns(), &[0, 1, 2]);
    }
}
