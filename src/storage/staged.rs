//! In-memory staging of record changes between commits.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::primitives::store::{Record, RecordStore};
use crate::types::{BatchError, Result};

use super::record::{
    NodeRecord, PropertyRecord, RelationshipGroupRecord, RelationshipRecord, SchemaRecord,
};
use super::stores::Stores;

/// A staged record: the durable baseline plus the working copy.
#[derive(Clone, Debug)]
pub struct RecordChange<R> {
    before: Option<R>,
    after: R,
    changed: bool,
    created: bool,
}

impl<R: Record> RecordChange<R> {
    /// Working copy, without marking it dirty.
    pub fn for_reading(&self) -> &R {
        &self.after
    }

    /// Working copy, marked dirty.
    pub fn for_changing(&mut self) -> &mut R {
        self.changed = true;
        &mut self.after
    }

    /// Durable state when the record was first staged.
    pub fn before(&self) -> Option<&R> {
        self.before.as_ref()
    }

    /// Whether the working copy will be written at commit.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Whether the record was created in this batch.
    pub fn is_created(&self) -> bool {
        self.created
    }
}

/// Staged changes for one record kind.
pub struct RecordChanges<R> {
    changes: FxHashMap<u64, RecordChange<R>>,
}

impl<R> Default for RecordChanges<R> {
    fn default() -> Self {
        Self {
            changes: FxHashMap::default(),
        }
    }
}

impl<R: Record> RecordChanges<R> {
    /// Stages a new in-use record under `id`.
    pub fn create(&mut self, id: u64, store: &RecordStore<R>) -> Result<&mut R> {
        let staged_in_use = self
            .changes
            .get(&id)
            .map(|c| c.after.in_use())
            .unwrap_or(false);
        if staged_in_use || (!self.changes.contains_key(&id) && store.is_in_use(id)) {
            return Err(BatchError::IdInUse { kind: R::KIND, id });
        }
        let mut after = R::unused(id);
        after.set_in_use(true);
        let before = self.changes.remove(&id).and_then(|c| c.before);
        let change = self.changes.entry(id).or_insert(RecordChange {
            before,
            after,
            changed: true,
            created: true,
        });
        Ok(&mut change.after)
    }

    /// Stages the durable record `id` on first touch and returns its change.
    pub fn get_or_load(&mut self, id: u64, store: &RecordStore<R>) -> Result<&mut RecordChange<R>> {
        if !self.changes.contains_key(&id) {
            let record = store.get_record(id)?;
            self.changes.insert(
                id,
                RecordChange {
                    before: Some(record.clone()),
                    after: record,
                    changed: false,
                    created: false,
                },
            );
        }
        match self.changes.get_mut(&id) {
            Some(change) if change.after.in_use() => Ok(change),
            _ => Err(BatchError::NotFound { kind: R::KIND, id }),
        }
    }

    /// Reads the current view of `id` without staging it.
    pub fn peek(&self, id: u64, store: &RecordStore<R>) -> Result<R> {
        match self.changes.get(&id) {
            Some(change) if change.after.in_use() => Ok(change.after.clone()),
            Some(_) => Err(BatchError::NotFound { kind: R::KIND, id }),
            None => store.get_record(id),
        }
    }

    /// Whether `id` is in use in the current view.
    pub fn is_in_use(&self, id: u64, store: &RecordStore<R>) -> bool {
        match self.changes.get(&id) {
            Some(change) => change.after.in_use(),
            None => store.is_in_use(id),
        }
    }

    /// Writes every dirty record to `store` and clears the stage.
    pub fn commit(&mut self, store: &mut RecordStore<R>) -> Result<usize> {
        let mut ids: Vec<u64> = self
            .changes
            .iter()
            .filter(|(_, c)| c.changed)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for id in &ids {
            if let Some(change) = self.changes.remove(id) {
                store.update_record(change.after)?;
            }
        }
        self.changes.clear();
        Ok(ids.len())
    }

    /// Number of staged records.
    pub fn changes_count(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drops every staged record.
    pub fn close(&mut self) {
        self.changes.clear();
    }
}

/// Records written by one commit, per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Schema records.
    pub schema: usize,
    /// Property records.
    pub properties: usize,
    /// Node records.
    pub nodes: usize,
    /// Relationship records.
    pub relationships: usize,
    /// Relationship group records.
    pub groups: usize,
}

impl CommitStats {
    /// Total records written.
    pub fn total(&self) -> usize {
        self.schema + self.properties + self.nodes + self.relationships + self.groups
    }
}

/// Staged changes for every record kind the inserter mutates.
#[derive(Default)]
pub struct RecordSet {
    /// Node changes.
    pub nodes: RecordChanges<NodeRecord>,
    /// Relationship changes.
    pub relationships: RecordChanges<RelationshipRecord>,
    /// Relationship group changes.
    pub groups: RecordChanges<RelationshipGroupRecord>,
    /// Property changes.
    pub properties: RecordChanges<PropertyRecord>,
    /// Schema rule changes.
    pub schema: RecordChanges<SchemaRecord>,
}

impl RecordSet {
    /// Makes every staged change durable.
    ///
    /// Records are written schema first, then properties, nodes,
    /// relationships and relationship groups.
    pub fn commit(&mut self, stores: &mut Stores) -> Result<CommitStats> {
        let stats = CommitStats {
            schema: self.schema.commit(&mut stores.schema)?,
            properties: self.properties.commit(&mut stores.properties.records)?,
            nodes: self.nodes.commit(&mut stores.nodes)?,
            relationships: self.relationships.commit(&mut stores.relationships)?,
            groups: self.groups.commit(&mut stores.groups)?,
        };
        if stats.total() > 0 {
            debug!(
                schema = stats.schema,
                properties = stats.properties,
                nodes = stats.nodes,
                relationships = stats.relationships,
                groups = stats.groups,
                "staged.commit"
            );
        }
        Ok(stats)
    }

    /// Number of staged records across kinds.
    pub fn changes_count(&self) -> usize {
        self.nodes.changes_count()
            + self.relationships.changes_count()
            + self.groups.changes_count()
            + self.properties.changes_count()
            + self.schema.changes_count()
    }

    /// Drops every staged record.
    pub fn close(&mut self) {
        self.nodes.close();
        self.relationships.close();
        self.groups.close();
        self.properties.close();
        self.schema.close();
    }
}
