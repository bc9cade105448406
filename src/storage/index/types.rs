use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::schema::{IndexRule, LabelSchemaDescriptor};
use crate::storage::types::PropValue;
use crate::types::{LabelId, NodeId, PropertyKeyId, Result};

/// What a provider needs to know about an index it populates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Indexed label and keys.
    pub schema: LabelSchemaDescriptor,
    /// Whether duplicate value tuples are rejected.
    pub unique: bool,
}

impl IndexDescriptor {
    /// Descriptor of an index rule.
    pub fn from_rule(rule: &IndexRule) -> Self {
        Self {
            schema: rule.descriptor.clone(),
            unique: rule.unique,
        }
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "unique {}", self.schema)
        } else {
            write!(f, "{}", self.schema)
        }
    }
}

/// Population state of an index as recorded by its provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalIndexState {
    /// Created but not yet (fully) populated.
    Populating,
    /// Populated and consistent with the store.
    Online,
    /// Population failed; the index is skipped until rebuilt.
    Failed,
}

/// A node's value tuple for one index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntryUpdate {
    /// Indexed node.
    pub node: NodeId,
    /// Values, in the descriptor's key order.
    pub values: Vec<PropValue>,
}

/// A node's label set before and after a change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLabelUpdate {
    /// Node whose labels changed.
    pub node: NodeId,
    /// Labels before the change.
    pub labels_before: Vec<LabelId>,
    /// Labels after the change.
    pub labels_after: Vec<LabelId>,
}

/// Read access to node properties, used to verify deferred constraints.
pub trait NodePropertyAccessor {
    /// Current value of `key` on `node`.
    fn get_property_value(&self, node: NodeId, key: PropertyKeyId) -> Result<Option<PropValue>>;
}

/// Renders a value tuple for error messages.
pub fn render_values(values: &[PropValue]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", parts.join(", "))
    }
}
