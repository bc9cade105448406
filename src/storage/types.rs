use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, RelationshipId};

/// Property value accepted and returned by the inserter.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of integers.
    IntArray(Vec<i64>),
    /// Array of floats.
    FloatArray(Vec<f64>),
    /// Array of strings.
    StrArray(Vec<String>),
}

impl PropValue {
    /// Short type name used in logs and the CLI.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Float(_) => "float",
            PropValue::Str(_) => "string",
            PropValue::Bytes(_) => "bytes",
            PropValue::BoolArray(_) => "bool[]",
            PropValue::IntArray(_) => "int[]",
            PropValue::FloatArray(_) => "float[]",
            PropValue::StrArray(_) => "string[]",
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::Str(v) => write!(f, "'{v}'"),
            PropValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
            PropValue::BoolArray(v) => write!(f, "{v:?}"),
            PropValue::IntArray(v) => write!(f, "{v:?}"),
            PropValue::FloatArray(v) => write!(f, "{v:?}"),
            PropValue::StrArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<Vec<u8>> for PropValue {
    fn from(value: Vec<u8>) -> Self {
        PropValue::Bytes(value)
    }
}

impl From<Vec<i64>> for PropValue {
    fn from(value: Vec<i64>) -> Self {
        PropValue::IntArray(value)
    }
}

impl From<Vec<f64>> for PropValue {
    fn from(value: Vec<f64>) -> Self {
        PropValue::FloatArray(value)
    }
}

impl From<Vec<bool>> for PropValue {
    fn from(value: Vec<bool>) -> Self {
        PropValue::BoolArray(value)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(value: Vec<String>) -> Self {
        PropValue::StrArray(value)
    }
}

/// Entity a property chain belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyOwner {
    /// Chain hangs off a node record.
    Node(u64),
    /// Chain hangs off a relationship record.
    Relationship(u64),
}

/// Relationship as seen through the inserter's read API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRelationship {
    /// Relationship id.
    pub id: RelationshipId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
    /// Relationship type name.
    pub rel_type: String,
}
