//! Relationship creation and traversal through per-type relationship groups.

use rustc_hash::FxHashSet;

use crate::types::{BatchError, Result, TypeId};

use super::record::{RelationshipGroupRecord, RelationshipRecord};
use super::staged::RecordSet;
use super::stores::Stores;

/// Direction of a group chain relative to the owning node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupChain {
    /// Relationships starting at the node.
    Out,
    /// Relationships ending at the node.
    In,
    /// Relationships starting and ending at the node.
    Loop,
}

/// Stages relationship `id` between `first` and `second` and links it into
/// both nodes' group chains.
///
/// Both nodes must exist. The relationship becomes the head of the first
/// node's outgoing chain and of the second node's incoming chain; a self-loop
/// is linked once into the loop chain.
pub fn create_relationship(
    id: u64,
    first: u64,
    second: u64,
    rel_type: TypeId,
    records: &mut RecordSet,
    stores: &mut Stores,
) -> Result<()> {
    records.nodes.get_or_load(first, &stores.nodes)?;
    records.nodes.get_or_load(second, &stores.nodes)?;

    let rel = records.relationships.create(id, &stores.relationships)?;
    rel.rel_type = rel_type;
    rel.first_node = first;
    rel.second_node = second;

    if first == second {
        link(id, first, rel_type, GroupChain::Loop, records, stores)?;
    } else {
        link(id, first, rel_type, GroupChain::Out, records, stores)?;
        link(id, second, rel_type, GroupChain::In, records, stores)?;
    }
    Ok(())
}

fn link(
    id: u64,
    node: u64,
    rel_type: TypeId,
    chain: GroupChain,
    records: &mut RecordSet,
    stores: &mut Stores,
) -> Result<()> {
    let group_id = get_or_create_group(node, rel_type, records, stores)?;
    let group = records
        .groups
        .get_or_load(group_id, &stores.groups)?
        .for_changing();
    let head = match chain {
        GroupChain::Out => group.first_out.replace(id),
        GroupChain::In => group.first_in.replace(id),
        GroupChain::Loop => group.first_loop.replace(id),
    };

    let rel = records
        .relationships
        .get_or_load(id, &stores.relationships)?
        .for_changing();
    if rel.first_node == node {
        rel.first_next_rel = head;
        rel.first_prev_rel = None;
    } else {
        rel.second_next_rel = head;
        rel.second_prev_rel = None;
    }

    if let Some(head) = head {
        records
            .relationships
            .get_or_load(head, &stores.relationships)?
            .for_changing()
            .set_prev_for(node, Some(id));
    }
    Ok(())
}

/// Finds the node's group for `rel_type`, creating it in type order if missing.
pub fn get_or_create_group(
    node: u64,
    rel_type: TypeId,
    records: &mut RecordSet,
    stores: &mut Stores,
) -> Result<u64> {
    let mut prev: Option<u64> = None;
    let mut cursor = records.nodes.peek(node, &stores.nodes)?.next_rel;
    let mut seen = FxHashSet::default();
    while let Some(group_id) = cursor {
        if !seen.insert(group_id) {
            return Err(BatchError::corruption(format!(
                "relationship group chain of node {node} loops at {group_id}"
            )));
        }
        let group = records.groups.peek(group_id, &stores.groups)?;
        if group.rel_type == rel_type {
            return Ok(group_id);
        }
        if group.rel_type > rel_type {
            break;
        }
        prev = Some(group_id);
        cursor = group.next_group;
    }

    let id = stores.groups.next_id()?;
    let group = records.groups.create(id, &stores.groups)?;
    group.owning_node = node;
    group.rel_type = rel_type;
    group.next_group = cursor;
    match prev {
        Some(prev) => {
            records
                .groups
                .get_or_load(prev, &stores.groups)?
                .for_changing()
                .next_group = Some(id);
        }
        None => {
            records
                .nodes
                .get_or_load(node, &stores.nodes)?
                .for_changing()
                .next_rel = Some(id);
        }
    }
    Ok(id)
}

/// Groups of `node`, in type order.
pub fn groups_of(
    node: u64,
    records: &RecordSet,
    stores: &Stores,
) -> Result<Vec<RelationshipGroupRecord>> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();
    let mut cursor = records.nodes.peek(node, &stores.nodes)?.next_rel;
    while let Some(group_id) = cursor {
        if !seen.insert(group_id) {
            return Err(BatchError::corruption(format!(
                "relationship group chain of node {node} loops at {group_id}"
            )));
        }
        let group = records.groups.peek(group_id, &stores.groups)?;
        cursor = group.next_group;
        out.push(group);
    }
    Ok(out)
}

/// Every relationship touching `node`, grouped by type then out, in, loop.
pub fn relationships_of(
    node: u64,
    records: &RecordSet,
    stores: &Stores,
) -> Result<Vec<RelationshipRecord>> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();
    for group in groups_of(node, records, stores)? {
        for head in [group.first_out, group.first_in, group.first_loop] {
            let mut cursor = head;
            while let Some(rel_id) = cursor {
                if !seen.insert(rel_id) {
                    return Err(BatchError::corruption(format!(
                        "relationship chain of node {node} loops at {rel_id}"
                    )));
                }
                let rel = records
                    .relationships
                    .peek(rel_id, &stores.relationships)
                    .map_err(|_| {
                        BatchError::corruption(format!(
                            "relationship chain of node {node} references missing {rel_id}"
                        ))
                    })?;
                cursor = rel.next_for(node);
                out.push(rel);
            }
        }
    }
    Ok(out)
}
