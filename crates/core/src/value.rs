//! Value type definitions.
//!
//! This module defines the `Value` enum, the single runtime representation for
//! every column of every relation, and `Shared`, a content-addressed shared
//! handle used for reference-typed columns.

use crate::error::EvalError;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A shared, immutable value.
///
/// Equality, ordering and hashing look through the pointer, so two handles
/// built from equal values are interchangeable everywhere in the engine.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shared(Arc<Value>);

impl Shared {
    /// Wraps a value in a new shared handle.
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// Returns the referenced value.
    #[inline]
    pub fn get(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for Shared {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Eq for Shared {}

impl PartialOrd for Shared {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Shared {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for Shared {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{:?}", self.0)
    }
}

/// A value stored in a tuple column.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 128-bit signed integer
    BigInt(i128),
    /// Unsigned bit vector; `bits` never has bits set above `width`
    Bits { width: u8, bits: u128 },
    /// 64-bit floating point, totally ordered with NaN greatest
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Fixed-arity tuple
    Tuple(Vec<Value>),
    /// Tagged union value
    Variant { tag: String, fields: Vec<Value> },
    /// Ordered sequence
    Vec(Vec<Value>),
    /// Ordered set
    Set(BTreeSet<Value>),
    /// Ordered map
    Map(BTreeMap<Value, Value>),
    /// Shared reference, compared by content
    Ref(Shared),
}

impl Value {
    /// Creates a bit vector, truncating `bits` to `width`.
    pub fn bits(width: u8, bits: u128) -> Self {
        Value::Bits {
            width,
            bits: bits & bit_mask(width),
        }
    }

    /// Creates a variant value.
    pub fn variant(tag: impl Into<String>, fields: Vec<Value>) -> Self {
        Value::Variant {
            tag: tag.into(),
            fields,
        }
    }

    /// Creates a shared reference value.
    pub fn shared(value: Value) -> Self {
        Value::Ref(Shared::new(value))
    }

    /// Returns the boolean value if this is a Bool, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int, None otherwise.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float, None otherwise.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the fields if this is a Tuple, None otherwise.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Follows a shared reference, or returns the value itself.
    pub fn follow(&self) -> &Value {
        match self {
            Value::Ref(shared) => shared.get().follow(),
            other => other,
        }
    }

    /// Matches a variant against the constructor `tag` and returns its fields.
    pub fn expect_variant(&self, tag: &str) -> Result<&[Value], EvalError> {
        match self {
            Value::Variant { tag: t, fields } if t == tag => Ok(fields.as_slice()),
            _ => Err(EvalError::PatternMismatch {
                expected: tag.to_string(),
            }),
        }
    }

    /// Returns a short name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Bits { .. } => "bits",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::Variant { .. } => "variant",
            Value::Vec(_) => "vec",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Ref(_) => "ref",
        }
    }

    /// Returns the additive identity for this value's numeric type.
    pub fn zero_like(&self) -> Result<Value, EvalError> {
        match self {
            Value::Int(_) => Ok(Value::Int(0)),
            Value::BigInt(_) => Ok(Value::BigInt(0)),
            Value::Bits { width, .. } => Ok(Value::Bits {
                width: *width,
                bits: 0,
            }),
            Value::Float(_) => Ok(Value::Float(0.0)),
            other => Err(EvalError::incompatible(format!(
                "{} is not numeric",
                other.type_name()
            ))),
        }
    }

    /// Computes `self + other`, failing on overflow or mismatched types.
    pub fn checked_add(&self, other: &Value) -> Result<Value, EvalError> {
        self.checked_add_scaled(other, 1)
    }

    /// Computes `self - other`, failing on overflow or mismatched types.
    pub fn checked_sub(&self, other: &Value) -> Result<Value, EvalError> {
        self.checked_add_scaled(other, -1)
    }

    /// Computes `self + other * weight` with checked arithmetic.
    pub fn checked_add_scaled(&self, other: &Value, weight: i64) -> Result<Value, EvalError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => b
                .checked_mul(weight)
                .and_then(|scaled| a.checked_add(scaled))
                .map(Value::Int)
                .ok_or(EvalError::Overflow),
            (Value::BigInt(a), Value::BigInt(b)) => b
                .checked_mul(weight as i128)
                .and_then(|scaled| a.checked_add(scaled))
                .map(Value::BigInt)
                .ok_or(EvalError::Overflow),
            (Value::Bits { width: wa, bits: a }, Value::Bits { width: wb, bits: b })
                if wa == wb =>
            {
                let scaled = b
                    .checked_mul(u128::from(weight.unsigned_abs()))
                    .ok_or(EvalError::Overflow)?;
                let bits = if weight >= 0 {
                    a.checked_add(scaled)
                } else {
                    a.checked_sub(scaled)
                }
                .ok_or(EvalError::Overflow)?;
                if bits & !bit_mask(*wa) != 0 {
                    return Err(EvalError::Overflow);
                }
                Ok(Value::Bits { width: *wa, bits })
            }
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b * weight as f64)),
            (a, b) => Err(EvalError::incompatible(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::BigInt(_) => 2,
            Value::Bits { .. } => 3,
            Value::Float(_) => 4,
            Value::String(_) => 5,
            Value::Tuple(_) => 6,
            Value::Variant { .. } => 7,
            Value::Vec(_) => 8,
            Value::Set(_) => 9,
            Value::Map(_) => 10,
            Value::Ref(_) => 11,
        }
    }
}

fn bit_mask(width: u8) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Total order on floats: NaN sorts last and equals itself, -0.0 equals 0.0.
fn float_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Bits { width: wa, bits: a }, Value::Bits { width: wb, bits: b }) => {
                wa.cmp(wb).then(a.cmp(b))
            }
            (Value::Float(a), Value::Float(b)) => float_cmp(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.cmp(b),
            (Value::Variant { tag: ta, fields: fa }, Value::Variant { tag: tb, fields: fb }) => {
                ta.cmp(tb).then_with(|| fa.cmp(fb))
            }
            (Value::Vec(a), Value::Vec(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Ref(a), Value::Ref(b)) => a.cmp(b),
            // Different types: order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_order().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::BigInt(i) => i.hash(state),
            Value::Bits { width, bits } => {
                width.hash(state);
                bits.hash(state);
            }
            Value::Float(f) => float_bits(*f).hash(state),
            Value::String(s) => s.hash(state),
            Value::Tuple(v) | Value::Vec(v) => v.hash(state),
            Value::Variant { tag, fields } => {
                tag.hash(state);
                fields.hash(state);
            }
            Value::Set(s) => s.hash(state),
            Value::Map(m) => m.hash(state),
            Value::Ref(r) => r.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Shared> for Value {
    fn from(v: Shared) -> Self {
        Value::Ref(v)
    }
}
