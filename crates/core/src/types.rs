//! Data type definitions for relation columns.

use crate::value::Value;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

/// One constructor of a tagged-union type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constructor {
    /// Constructor tag.
    pub name: String,
    /// Field types, in order.
    pub fields: Vec<DataType>,
}

impl Constructor {
    /// Creates a constructor definition.
    pub fn new(name: impl Into<String>, fields: Vec<DataType>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Column types understood by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// Boolean type
    Bool,
    /// 64-bit signed integer
    Int,
    /// 128-bit signed integer
    BigInt,
    /// Unsigned bit vector of the given width (1..=128)
    Bits(u8),
    /// 64-bit floating point number with total ordering
    Float,
    /// UTF-8 string
    String,
    /// Fixed-arity tuple
    Tuple(Vec<DataType>),
    /// Tagged union
    Variant(Vec<Constructor>),
    /// Ordered sequence
    Vec(Box<DataType>),
    /// Ordered set
    Set(Box<DataType>),
    /// Ordered map
    Map(Box<DataType>, Box<DataType>),
    /// Shared reference to a value of the given type
    Ref(Box<DataType>),
    /// Accepts any value
    Any,
}

impl DataType {
    /// Returns true if `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (DataType::Any, _) => true,
            (DataType::Bool, Value::Bool(_)) => true,
            (DataType::Int, Value::Int(_)) => true,
            (DataType::BigInt, Value::BigInt(_)) => true,
            (DataType::Bits(width), Value::Bits { width: w, .. }) => width == w,
            (DataType::Float, Value::Float(_)) => true,
            (DataType::String, Value::String(_)) => true,
            (DataType::Tuple(types), Value::Tuple(values)) => {
                types.len() == values.len()
                    && types.iter().zip(values).all(|(t, v)| t.matches(v))
            }
            (DataType::Variant(ctors), Value::Variant { tag, fields }) => {
                ctors.iter().any(|c| {
                    c.name == *tag
                        && c.fields.len() == fields.len()
                        && c.fields.iter().zip(fields).all(|(t, v)| t.matches(v))
                })
            }
            (DataType::Vec(elem), Value::Vec(values)) => values.iter().all(|v| elem.matches(v)),
            (DataType::Set(elem), Value::Set(values)) => values.iter().all(|v| elem.matches(v)),
            (DataType::Map(k, v), Value::Map(entries)) => {
                entries.iter().all(|(key, val)| k.matches(key) && v.matches(val))
            }
            (DataType::Ref(inner), Value::Ref(shared)) => inner.matches(shared.get()),
            _ => false,
        }
    }

    /// Returns true for the numeric types `Sum` can fold.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::BigInt | DataType::Bits(_) | DataType::Float
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Shared;
    use alloc::vec;

    #[test]
    fn test_scalar_matches() {
        assert!(DataType::Int.matches(&Value::Int(3)));
        assert!(!DataType::Int.matches(&Value::BigInt(3)));
        assert!(DataType::Bits(8).matches(&Value::bits(8, 255)));
        assert!(!DataType::Bits(16).matches(&Value::bits(8, 255)));
        assert!(DataType::Any.matches(&Value::from("x")));
    }

    #[test]
    fn test_variant_matches() {
        let option = DataType::Variant(vec![
            Constructor::new("None", vec![]),
            Constructor::new("Some", vec![DataType::Int]),
        ]);
        assert!(option.matches(&Value::variant("Some", vec![Value::Int(1)])));
        assert!(option.matches(&Value::variant("None", vec![])));
        assert!(!option.matches(&Value::variant("Some", vec![Value::from("x")])));
        assert!(!option.matches(&Value::variant("Other", vec![])));
    }

    #[test]
    fn test_nested_matches() {
        let ty = DataType::Vec(Box::new(DataType::Ref(Box::new(DataType::String))));
        let value = Value::Vec(vec![Value::Ref(Shared::new(Value::from("a")))]);
        assert!(ty.matches(&value));
        assert!(!ty.matches(&Value::Vec(vec![Value::Int(1)])));
    }

    #[test]
    fn test_numeric() {
        assert!(DataType::Float.is_numeric());
        assert!(!DataType::String.is_numeric());
    }
}
