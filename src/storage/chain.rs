//! Property chains: singly-owned, doubly-linked lists of property records.
//!
//! Every function takes the staged property records and the property stores
//! as separate borrows so callers can hold the owner record mutably at the
//! same time.

use rustc_hash::FxHashSet;

use crate::primitives::store::Record;
use crate::types::{BatchError, PropertyKeyId, Result};

use super::props::{decode_value, encode_value, release_value};
use super::record::{
    NodeRecord, PropertyBlock, PropertyRecord, RelationshipRecord, PROPERTY_RECORD_BLOCKS,
};
use super::staged::RecordChanges;
use super::stores::PropertyStores;
use super::types::{PropValue, PropertyOwner};

/// A record that anchors a property chain.
pub trait PropertyContainer {
    /// Owner tag written into every record of the chain.
    fn owner(&self) -> PropertyOwner;
    /// Head of the chain.
    fn next_prop(&self) -> Option<u64>;
    /// Re-anchors the chain.
    fn set_next_prop(&mut self, head: Option<u64>);
}

impl PropertyContainer for NodeRecord {
    fn owner(&self) -> PropertyOwner {
        PropertyOwner::Node(self.id)
    }

    fn next_prop(&self) -> Option<u64> {
        self.next_prop
    }

    fn set_next_prop(&mut self, head: Option<u64>) {
        self.next_prop = head;
    }
}

impl PropertyContainer for RelationshipRecord {
    fn owner(&self) -> PropertyOwner {
        PropertyOwner::Relationship(self.id)
    }

    fn next_prop(&self) -> Option<u64> {
        self.next_prop
    }

    fn set_next_prop(&mut self, head: Option<u64>) {
        self.next_prop = head;
    }
}

type Props = RecordChanges<PropertyRecord>;

/// Builds a fresh chain from resolved entries and returns its head.
///
/// A key repeated in `entries` keeps its last value.
pub fn create_chain(
    owner: PropertyOwner,
    entries: Vec<(PropertyKeyId, PropValue)>,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<Option<u64>> {
    let mut deduped: Vec<(PropertyKeyId, PropValue)> = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match deduped.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => deduped.push((key, value)),
        }
    }
    if deduped.is_empty() {
        return Ok(None);
    }

    let mut records: Vec<Vec<PropertyBlock>> = vec![Vec::new()];
    let mut used = 0usize;
    for (key, value) in &deduped {
        let block = PropertyBlock {
            key: *key,
            value: encode_value(value, stores)?,
        };
        let units = block.value.units();
        if used + units > PROPERTY_RECORD_BLOCKS {
            records.push(Vec::new());
            used = 0;
        }
        used += units;
        if let Some(current) = records.last_mut() {
            current.push(block);
        }
    }

    let mut ids = Vec::with_capacity(records.len());
    for _ in 0..records.len() {
        ids.push(stores.records.next_id()?);
    }
    for (i, blocks) in records.into_iter().enumerate() {
        let record = props.create(ids[i], &stores.records)?;
        record.owner = Some(owner);
        record.prev_prop = i.checked_sub(1).map(|p| ids[p]);
        record.next_prop = ids.get(i + 1).copied();
        record.blocks = blocks;
    }
    Ok(ids.first().copied())
}

/// Deletes the owner's chain and builds a new one from `entries`.
pub fn replace_chain<C: PropertyContainer>(
    owner: &mut C,
    entries: Vec<(PropertyKeyId, PropValue)>,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<()> {
    delete_chain(owner, props, stores)?;
    let head = create_chain(owner.owner(), entries, props, stores)?;
    owner.set_next_prop(head);
    Ok(())
}

/// Id of the record in the chain that holds `key`.
pub fn find_property(
    head: Option<u64>,
    key: PropertyKeyId,
    props: &Props,
    stores: &PropertyStores,
) -> Result<Option<u64>> {
    for record in walk(head, props, stores)? {
        if record.block_index(key).is_some() {
            return Ok(Some(record.id));
        }
    }
    Ok(None)
}

/// Every property of the chain, in chain order.
pub fn read_all(
    head: Option<u64>,
    props: &Props,
    stores: &PropertyStores,
) -> Result<Vec<(PropertyKeyId, PropValue)>> {
    let mut out: Vec<(PropertyKeyId, PropValue)> = Vec::new();
    for record in walk(head, props, stores)? {
        for block in &record.blocks {
            let value = decode_value(&block.value, stores)?;
            match out.iter_mut().find(|(k, _)| *k == block.key) {
                Some(slot) => slot.1 = value,
                None => out.push((block.key, value)),
            }
        }
    }
    Ok(out)
}

/// Value of `key`, if the chain holds it.
pub fn read_property(
    head: Option<u64>,
    key: PropertyKeyId,
    props: &Props,
    stores: &PropertyStores,
) -> Result<Option<PropValue>> {
    for record in walk(head, props, stores)? {
        if let Some(idx) = record.block_index(key) {
            return decode_value(&record.blocks[idx].value, stores).map(Some);
        }
    }
    Ok(None)
}

/// Marks every record of the owner's chain unused and releases overflow values.
pub fn delete_chain<C: PropertyContainer>(
    owner: &mut C,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<usize> {
    let records = walk(owner.next_prop(), props, stores)?;
    let deleted = records.len();
    for record in records {
        for block in &record.blocks {
            release_value(&block.value, stores)?;
        }
        let staged = props.get_or_load(record.id, &stores.records)?.for_changing();
        staged.blocks.clear();
        staged.prev_prop = None;
        staged.next_prop = None;
        staged.set_in_use(false);
    }
    owner.set_next_prop(None);
    Ok(deleted)
}

/// Sets `key` to `value` on the owner's chain.
///
/// The value is replaced in place when the record holding the key still has
/// room for it; otherwise the old block is removed and the new one added.
pub fn set_property<C: PropertyContainer>(
    owner: &mut C,
    key: PropertyKeyId,
    value: &PropValue,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<()> {
    let block = PropertyBlock {
        key,
        value: encode_value(value, stores)?,
    };
    if let Some(record_id) = find_property(owner.next_prop(), key, props, stores)? {
        let record = props.get_or_load(record_id, &stores.records)?.for_changing();
        let idx = record
            .block_index(key)
            .ok_or_else(|| BatchError::corruption(format!("property record {record_id} lost key {key}")))?;
        let old_units = record.blocks[idx].value.units();
        if record.used_units() - old_units + block.value.units() <= PROPERTY_RECORD_BLOCKS {
            let old = std::mem::replace(&mut record.blocks[idx], block);
            release_value(&old.value, stores)?;
            return Ok(());
        }
        remove_block(owner, record_id, key, props, stores)?;
    }
    add_block(owner, block, props, stores)
}

/// Removes `key` from the owner's chain.
///
/// Fails with `NotFound` when the chain does not hold the key.
pub fn remove_property<C: PropertyContainer>(
    owner: &mut C,
    key: PropertyKeyId,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<()> {
    match find_property(owner.next_prop(), key, props, stores)? {
        Some(record_id) => remove_block(owner, record_id, key, props, stores),
        None => Err(BatchError::NotFound {
            kind: "property",
            id: u64::from(key.0),
        }),
    }
}

fn add_block<C: PropertyContainer>(
    owner: &mut C,
    block: PropertyBlock,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<()> {
    let units = block.value.units();
    let head = owner.next_prop();
    let with_room = walk(head, props, stores)?
        .into_iter()
        .find(|record| record.free_units() >= units)
        .map(|record| record.id);
    if let Some(record_id) = with_room {
        props
            .get_or_load(record_id, &stores.records)?
            .for_changing()
            .blocks
            .push(block);
        return Ok(());
    }

    let id = stores.records.next_id()?;
    let record = props.create(id, &stores.records)?;
    record.owner = Some(owner.owner());
    record.next_prop = head;
    record.blocks.push(block);
    if let Some(old_head) = head {
        props
            .get_or_load(old_head, &stores.records)?
            .for_changing()
            .prev_prop = Some(id);
    }
    owner.set_next_prop(Some(id));
    Ok(())
}

fn remove_block<C: PropertyContainer>(
    owner: &mut C,
    record_id: u64,
    key: PropertyKeyId,
    props: &mut Props,
    stores: &mut PropertyStores,
) -> Result<()> {
    let record = props.get_or_load(record_id, &stores.records)?.for_changing();
    let Some(idx) = record.block_index(key) else {
        return Err(BatchError::NotFound {
            kind: "property",
            id: u64::from(key.0),
        });
    };
    let removed = record.blocks.remove(idx);
    let emptied = record.blocks.is_empty();
    let (prev, next) = (record.prev_prop, record.next_prop);
    if emptied {
        record.prev_prop = None;
        record.next_prop = None;
        record.set_in_use(false);
    }
    release_value(&removed.value, stores)?;
    if !emptied {
        return Ok(());
    }
    match prev {
        Some(prev) => {
            props.get_or_load(prev, &stores.records)?.for_changing().next_prop = next;
        }
        None => owner.set_next_prop(next),
    }
    if let Some(next) = next {
        props.get_or_load(next, &stores.records)?.for_changing().prev_prop = prev;
    }
    Ok(())
}

fn walk(head: Option<u64>, props: &Props, stores: &PropertyStores) -> Result<Vec<PropertyRecord>> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    let mut cursor = head;
    while let Some(id) = cursor {
        if !seen.insert(id) {
            return Err(BatchError::corruption(format!(
                "property chain loops at record {id}"
            )));
        }
        let record = props.peek(id, &stores.records).map_err(|err| match err {
            BatchError::NotFound { .. } => BatchError::corruption(format!(
                "property chain references missing record {id}"
            )),
            other => other,
        })?;
        cursor = record.next_prop;
        out.push(record);
    }
    Ok(out)
}
