//! Signal values and their type tags.
//!
//! Signals carry two-state data only: a single boolean or a fixed-width
//! [`BitVec`]. Edge detection treats a value as "true-like" through
//! [`Value::is_high`], which for bit vectors is the least-significant bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use strobe_common::BitVec;

/// The type tag of a signal, fixed at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// A single boolean.
    Bool,
    /// A bit vector of the given width.
    Bits(u32),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Bits(width) => write!(f, "bits[{width}]"),
        }
    }
}

/// A committed or pending signal value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// A boolean value.
    Bool(bool),
    /// A bit-vector value.
    Bits(BitVec),
}

impl Value {
    /// Creates a bit-vector value holding the low `width` bits of `value`.
    pub fn bits(value: u64, width: u32) -> Self {
        Value::Bits(BitVec::from_u64(value, width))
    }

    /// Returns the type tag of this value.
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Bits(v) => ValueType::Bits(v.width()),
        }
    }

    /// Returns `true` if the value is true-like for edge detection.
    pub fn is_high(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Bits(v) => v.lsb(),
        }
    }

    /// Returns the boolean, or `None` for a bit vector.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Bits(_) => None,
        }
    }

    /// Returns the bit vector, or `None` for a boolean.
    pub fn as_bits(&self) -> Option<&BitVec> {
        match self {
            Value::Bool(_) => None,
            Value::Bits(v) => Some(v),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BitVec> for Value {
    fn from(v: BitVec) -> Self {
        Value::Bits(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Bits(v) => write!(f, "0b{v}"),
        }
    }
}
