//! Identifier newtypes and the crate-wide error type.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Checksum helpers used by the record files.
pub mod checksum;

/// Identifier of a node record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of a relationship record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(pub u64);

/// Identifier of a label token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u32);

/// Identifier of a relationship type token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Identifier of a property key token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyKeyId(pub u32);

/// Identifier of a schema rule record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

/// Errors surfaced by the bulk-loading engine.
///
/// Only [`BatchError::SchemaConflict`] leaves the session usable; every other
/// variant is either a caller contract violation or a fatal storage failure.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    /// Underlying file I/O failed.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// A record file or chain failed validation.
    #[error("corruption: {0}")]
    Corruption(String),
    /// A store file payload could not be (de)serialized.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An argument violated the operation contract.
    #[error("invalid argument: {0}")]
    Invalid(String),
    /// An id outside the valid range for its store.
    #[error("invalid {kind} id {id}")]
    InvalidId {
        /// Record kind the id was meant for.
        kind: &'static str,
        /// Offending id.
        id: u64,
    },
    /// A caller-chosen id is already in use.
    #[error("{kind} id={id} already in use")]
    IdInUse {
        /// Record kind the id was meant for.
        kind: &'static str,
        /// Offending id.
        id: u64,
    },
    /// A record that does not exist (or is not in use) was requested.
    #[error("{kind} id={id} not found")]
    NotFound {
        /// Record kind that was looked up.
        kind: &'static str,
        /// Requested id.
        id: u64,
    },
    /// The id sequence of a store ran out.
    #[error("id space exhausted for {0}")]
    IdSpaceExhausted(&'static str),
    /// The store directory is locked by another session.
    #[error("store at {0} is locked by another process")]
    StoreLocked(PathBuf),
    /// An index or constraint conflicts with an existing schema rule.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),
    /// A uniqueness index found two nodes with the same value tuple.
    #[error(
        "index entry conflict on {descriptor}: value {value} is held by node {existing_node} and node {added_node}"
    )]
    IndexEntryConflict {
        /// Human readable `:Label(keys)` descriptor.
        descriptor: String,
        /// Rendered value tuple.
        value: String,
        /// Node already holding the value.
        existing_node: u64,
        /// Node that tried to add the same value.
        added_node: u64,
    },
    /// The operation is not available in batch mode.
    #[error("batch inserter doesn't support this: {0}")]
    Unsupported(&'static str),
    /// The session has been shut down.
    #[error("batch inserter has been shut down")]
    ShutDown,
    /// `shutdown` was called twice.
    #[error("batch inserter already has shutdown")]
    AlreadyShutDown,
    /// Configuration could not be parsed or was rejected.
    #[error("configuration: {0}")]
    Config(String),
}

impl BatchError {
    /// Returns `true` when the session stays usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BatchError::SchemaConflict(_))
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        BatchError::Corruption(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, BatchError>;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropertyKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LabelId {
    fn from(value: u32) -> Self {
        LabelId(value)
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

impl From<u32> for PropertyKeyId {
    fn from(value: u32) -> Self {
        PropertyKeyId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_schema_conflicts_are_recoverable() {
        assert!(BatchError::SchemaConflict("dup".into()).is_recoverable());
        assert!(!BatchError::ShutDown.is_recoverable());
        assert!(!BatchError::IdSpaceExhausted("node").is_recoverable());
        assert!(!BatchError::Unsupported("drop index").is_recoverable());
    }

    #[test]
    fn error_messages_name_the_record() {
        let err = BatchError::IdInUse { kind: "node", id: 7 };
        assert_eq!(err.to_string(), "node id=7 already in use");
        let err = BatchError::NotFound {
            kind: "relationship",
            id: 3,
        };
        assert_eq!(err.to_string(), "relationship id=3 not found");
    }
}
