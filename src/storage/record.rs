//! Durable record kinds written by the inserter.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::primitives::store::Record;
use crate::types::{LabelId, PropertyKeyId, TypeId};

use super::schema::SchemaRule;
use super::types::PropertyOwner;

/// Maximum number of block units one property record holds.
pub const PROPERTY_RECORD_BLOCKS: usize = 4;

/// Storage of a node's label set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelField {
    /// Sorted, duplicate-free label ids stored in the node record.
    Inline(SmallVec<[LabelId; 4]>),
    /// Label ids encoded in a chain of the node-label dynamic store.
    Dynamic {
        /// First dynamic record of the chain.
        first: u64,
    },
}

impl Default for LabelField {
    fn default() -> Self {
        LabelField::Inline(SmallVec::new())
    }
}

/// Node record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id.
    pub id: u64,
    /// Whether the node is live.
    pub in_use: bool,
    /// First relationship group of the node.
    pub next_rel: Option<u64>,
    /// First property record of the node.
    pub next_prop: Option<u64>,
    /// Label set.
    pub labels: LabelField,
}

impl Record for NodeRecord {
    const KIND: &'static str = "node";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        NodeRecord {
            id,
            in_use: false,
            next_rel: None,
            next_prop: None,
            labels: LabelField::default(),
        }
    }
}

/// Relationship record, doubly linked into the chains of both endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// Relationship id.
    pub id: u64,
    /// Whether the relationship is live.
    pub in_use: bool,
    /// Relationship type.
    pub rel_type: TypeId,
    /// Start node.
    pub first_node: u64,
    /// End node.
    pub second_node: u64,
    /// Previous relationship in the start node's chain.
    pub first_prev_rel: Option<u64>,
    /// Next relationship in the start node's chain.
    pub first_next_rel: Option<u64>,
    /// Previous relationship in the end node's chain.
    pub second_prev_rel: Option<u64>,
    /// Next relationship in the end node's chain.
    pub second_next_rel: Option<u64>,
    /// First property record.
    pub next_prop: Option<u64>,
}

impl RelationshipRecord {
    /// Whether both endpoints are the same node.
    pub fn is_loop(&self) -> bool {
        self.first_node == self.second_node
    }

    /// Next relationship in `node`'s chain.
    pub fn next_for(&self, node: u64) -> Option<u64> {
        if self.first_node == node {
            self.first_next_rel
        } else {
            self.second_next_rel
        }
    }

    /// Sets the previous link on `node`'s side.
    pub fn set_prev_for(&mut self, node: u64, prev: Option<u64>) {
        if self.first_node == node {
            self.first_prev_rel = prev;
        } else {
            self.second_prev_rel = prev;
        }
    }
}

impl Record for RelationshipRecord {
    const KIND: &'static str = "relationship";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        RelationshipRecord {
            id,
            in_use: false,
            rel_type: TypeId(0),
            first_node: 0,
            second_node: 0,
            first_prev_rel: None,
            first_next_rel: None,
            second_prev_rel: None,
            second_next_rel: None,
            next_prop: None,
        }
    }
}

/// Per-node, per-type anchor of the outgoing, incoming and loop chains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGroupRecord {
    /// Group id.
    pub id: u64,
    /// Whether the group is live.
    pub in_use: bool,
    /// Node the group belongs to.
    pub owning_node: u64,
    /// Relationship type of every chain in the group.
    pub rel_type: TypeId,
    /// Next group of the same node, in ascending type order.
    pub next_group: Option<u64>,
    /// Head of the outgoing chain.
    pub first_out: Option<u64>,
    /// Head of the incoming chain.
    pub first_in: Option<u64>,
    /// Head of the self-loop chain.
    pub first_loop: Option<u64>,
}

impl Record for RelationshipGroupRecord {
    const KIND: &'static str = "relationship group";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        RelationshipGroupRecord {
            id,
            in_use: false,
            owning_node: 0,
            rel_type: TypeId(0),
            next_group: None,
            first_out: None,
            first_in: None,
            first_loop: None,
        }
    }
}

/// Encoded property value as held by a property block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockValue {
    /// Inline boolean.
    Bool(bool),
    /// Inline integer.
    Int(i64),
    /// Inline float, stored as its bit pattern.
    Float(u64),
    /// Inline string up to the short-string limit.
    ShortStr(String),
    /// Inline byte string up to the short-string limit.
    ShortBytes(Vec<u8>),
    /// String in the property string store.
    LongStr {
        /// First dynamic record.
        first: u64,
    },
    /// Byte string in the property string store.
    LongBytes {
        /// First dynamic record.
        first: u64,
    },
    /// Encoded array in the property array store.
    Array {
        /// First dynamic record.
        first: u64,
    },
}

impl BlockValue {
    /// Number of block units the value occupies in a property record.
    pub fn units(&self) -> usize {
        match self {
            BlockValue::ShortStr(s) => 1 + s.len().div_ceil(8),
            BlockValue::ShortBytes(b) => 1 + b.len().div_ceil(8),
            _ => 1,
        }
    }

    /// Head of the dynamic chain holding the value, if any.
    pub fn dynamic_pointer(&self) -> Option<u64> {
        match self {
            BlockValue::LongStr { first }
            | BlockValue::LongBytes { first }
            | BlockValue::Array { first } => Some(*first),
            _ => None,
        }
    }
}

/// One key/value slot of a property record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBlock {
    /// Property key token.
    pub key: PropertyKeyId,
    /// Encoded value.
    pub value: BlockValue,
}

/// A link of an owner's property chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Record id.
    pub id: u64,
    /// Whether the record is live.
    pub in_use: bool,
    /// Node or relationship the chain hangs off.
    pub owner: Option<PropertyOwner>,
    /// Previous record in the chain.
    pub prev_prop: Option<u64>,
    /// Next record in the chain.
    pub next_prop: Option<u64>,
    /// Blocks, at most [`PROPERTY_RECORD_BLOCKS`] units in total.
    pub blocks: Vec<PropertyBlock>,
}

impl PropertyRecord {
    /// Units currently used.
    pub fn used_units(&self) -> usize {
        self.blocks.iter().map(|b| b.value.units()).sum()
    }

    /// Units still available.
    pub fn free_units(&self) -> usize {
        PROPERTY_RECORD_BLOCKS.saturating_sub(self.used_units())
    }

    /// Index of the block holding `key`.
    pub fn block_index(&self, key: PropertyKeyId) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }
}

impl Record for PropertyRecord {
    const KIND: &'static str = "property";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        PropertyRecord {
            id,
            in_use: false,
            owner: None,
            prev_prop: None,
            next_prop: None,
            blocks: Vec::new(),
        }
    }
}

/// Schema store record wrapping one rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// Rule id.
    pub id: u64,
    /// Whether the rule is live.
    pub in_use: bool,
    /// The rule itself.
    pub rule: Option<SchemaRule>,
}

impl Record for SchemaRecord {
    const KIND: &'static str = "schema rule";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        SchemaRecord {
            id,
            in_use: false,
            rule: None,
        }
    }
}

/// Token record; the name lives in the kind's name store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token id.
    pub id: u64,
    /// Whether the token is live.
    pub in_use: bool,
    /// First dynamic record of the name.
    pub name_id: u64,
}

impl Record for TokenRecord {
    const KIND: &'static str = "token";

    fn id(&self) -> u64 {
        self.id
    }

    fn in_use(&self) -> bool {
        self.in_use
    }

    fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    fn unused(id: u64) -> Self {
        TokenRecord {
            id,
            in_use: false,
            name_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_cost_extra_units() {
        assert_eq!(BlockValue::Int(1).units(), 1);
        assert_eq!(BlockValue::ShortStr(String::new()).units(), 1);
        assert_eq!(BlockValue::ShortStr("a".into()).units(), 2);
        assert_eq!(BlockValue::ShortStr("x".repeat(23)).units(), 4);
        assert_eq!(BlockValue::LongStr { first: 9 }.units(), 1);
    }

    #[test]
    fn relationship_links_follow_the_node_side() {
        let mut rel = RelationshipRecord::unused(5);
        rel.first_node = 1;
        rel.second_node = 2;
        rel.first_next_rel = Some(10);
        rel.second_next_rel = Some(20);
        assert_eq!(rel.next_for(1), Some(10));
        assert_eq!(rel.next_for(2), Some(20));
        rel.set_prev_for(2, Some(3));
        assert_eq!(rel.second_prev_rel, Some(3));
        assert!(!rel.is_loop());
    }

    #[test]
    fn property_record_tracks_capacity() {
        let mut rec = PropertyRecord::unused(0);
        rec.blocks.push(PropertyBlock {
            key: PropertyKeyId(1),
            value: BlockValue::ShortStr("abcdefgh".into()),
        });
        assert_eq!(rec.used_units(), 2);
        assert_eq!(rec.free_units(), 2);
        assert_eq!(rec.block_index(PropertyKeyId(1)), Some(0));
        assert_eq!(rec.block_index(PropertyKeyId(2)), None);
    }
}
