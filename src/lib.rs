//! Bulk loader for record-store graph databases.
//!
//! [`BatchInserter`] writes nodes, relationships, properties, labels and
//! deferred schema rules straight into the record stores of an offline
//! store directory, then rebuilds counts and populates indexes when the
//! session is shut down.

#![warn(missing_docs)]

pub mod cli;
pub mod primitives;
pub mod storage;
pub mod types;

pub use storage::{BatchInserter, InserterOptions, PropValue};
pub use types::{BatchError, LabelId, NodeId, PropertyKeyId, RelationshipId, Result, RuleId, TypeId};
