//! File-backed index provider: one store file per index rule.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::store::{read_store_file, write_store_file};
use crate::storage::props::value_key;
use crate::storage::schema::ProviderDescriptor;
use crate::storage::types::PropValue;
use crate::types::{BatchError, NodeId, Result, RuleId};

use super::types::{
    render_values, IndexDescriptor, IndexEntryUpdate, InternalIndexState, NodePropertyAccessor,
};
use super::{IndexPopulator, IndexProvider};

#[derive(Serialize, Deserialize)]
struct IndexFile {
    rule: RuleId,
    descriptor: IndexDescriptor,
    state: InternalIndexState,
    failure: Option<String>,
    entries: Vec<IndexFileEntry>,
}

#[derive(Serialize, Deserialize)]
struct IndexFileEntry {
    key: Vec<u8>,
    nodes: Vec<u64>,
}

/// Index provider keeping each index in `<store>/schema/index/<rule>.db`.
pub struct NativeIndexProvider {
    dir: PathBuf,
}

impl NativeIndexProvider {
    /// Provider rooted at the store directory `store_dir`.
    pub fn new(store_dir: &Path) -> Self {
        Self {
            dir: store_dir.join("schema").join("index"),
        }
    }

    fn path(&self, rule: RuleId) -> PathBuf {
        self.dir.join(format!("{}.db", rule.0))
    }

    /// Reader over the persisted index of `rule`.
    pub fn reader(&self, rule: RuleId) -> Result<IndexReader> {
        let file: IndexFile = read_store_file(&self.path(rule))?.ok_or(BatchError::NotFound {
            kind: "index",
            id: rule.0,
        })?;
        let entries = file
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.nodes))
            .collect();
        Ok(IndexReader {
            descriptor: file.descriptor,
            state: file.state,
            failure: file.failure,
            entries,
        })
    }
}

impl IndexProvider for NativeIndexProvider {
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::default()
    }

    fn initial_state(&self, rule: RuleId, _index: &IndexDescriptor) -> Result<InternalIndexState> {
        Ok(read_store_file::<IndexFile>(&self.path(rule))?
            .map(|file| file.state)
            .unwrap_or(InternalIndexState::Populating))
    }

    fn populator(&self, rule: RuleId, index: &IndexDescriptor) -> Result<Box<dyn IndexPopulator>> {
        Ok(Box::new(NativeIndexPopulator {
            path: self.path(rule),
            rule,
            descriptor: index.clone(),
            entries: BTreeMap::new(),
            failure: None,
            closed: false,
        }))
    }
}

struct Entry {
    values: Vec<PropValue>,
    nodes: BTreeSet<u64>,
}

struct NativeIndexPopulator {
    path: PathBuf,
    rule: RuleId,
    descriptor: IndexDescriptor,
    entries: BTreeMap<Vec<u8>, Entry>,
    failure: Option<String>,
    closed: bool,
}

impl NativeIndexPopulator {
    fn conflict(&self, values: &[PropValue], existing: u64, added: u64) -> BatchError {
        BatchError::IndexEntryConflict {
            descriptor: self.descriptor.schema.to_string(),
            value: render_values(values),
            existing_node: existing.min(added),
            added_node: existing.max(added),
        }
    }

    fn persist(&self, state: InternalIndexState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let entries = if state == InternalIndexState::Failed {
            Vec::new()
        } else {
            self.entries
                .iter()
                .map(|(key, entry)| IndexFileEntry {
                    key: key.clone(),
                    nodes: entry.nodes.iter().copied().collect(),
                })
                .collect()
        };
        write_store_file(
            &self.path,
            &IndexFile {
                rule: self.rule,
                descriptor: self.descriptor.clone(),
                state,
                failure: self.failure.clone(),
                entries,
            },
        )
    }
}

fn tuple_key(values: &[PropValue]) -> Result<Vec<u8>> {
    let mut key = Vec::new();
    for value in values {
        value_key(value, &mut key)?;
    }
    Ok(key)
}

impl IndexPopulator for NativeIndexPopulator {
    fn create(&mut self) -> Result<()> {
        self.entries.clear();
        self.failure = None;
        self.closed = false;
        self.persist(InternalIndexState::Populating)
    }

    fn add(&mut self, updates: &[IndexEntryUpdate]) -> Result<()> {
        for update in updates {
            let key = tuple_key(&update.values)?;
            let node = update.node.0;
            if self.descriptor.unique {
                if let Some(existing) = self.entries.get(&key) {
                    if let Some(holder) = existing.nodes.iter().find(|n| **n != node) {
                        return Err(self.conflict(&update.values, *holder, node));
                    }
                }
            }
            self.entries
                .entry(key)
                .or_insert_with(|| Entry {
                    values: update.values.clone(),
                    nodes: BTreeSet::new(),
                })
                .nodes
                .insert(node);
        }
        Ok(())
    }

    fn verify_deferred_constraints(&mut self, accessor: &dyn NodePropertyAccessor) -> Result<()> {
        if !self.descriptor.unique {
            return Ok(());
        }
        let mut seen: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for entry in self.entries.values() {
            for node in &entry.nodes {
                let mut values = Vec::with_capacity(self.descriptor.schema.property_keys.len());
                for key in &self.descriptor.schema.property_keys {
                    match accessor.get_property_value(NodeId(*node), *key)? {
                        Some(value) => values.push(value),
                        None => break,
                    }
                }
                if values.len() != self.descriptor.schema.property_keys.len() {
                    continue;
                }
                let key = tuple_key(&values)?;
                if let Some(existing) = seen.insert(key, *node) {
                    if existing != *node {
                        return Err(self.conflict(&entry.values, existing, *node));
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, populated: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let state = if populated {
            InternalIndexState::Online
        } else {
            if self.failure.is_none() {
                self.failure = Some("population did not complete".into());
            }
            InternalIndexState::Failed
        };
        self.persist(state)?;
        debug!(
            rule = self.rule.0,
            state = ?state,
            entries = self.entries.len(),
            "index.populator.close"
        );
        Ok(())
    }

    fn mark_as_failed(&mut self, reason: &str) -> Result<()> {
        self.failure = Some(reason.to_owned());
        Ok(())
    }
}

/// Read access to a populated index.
pub struct IndexReader {
    descriptor: IndexDescriptor,
    state: InternalIndexState,
    failure: Option<String>,
    entries: BTreeMap<Vec<u8>, Vec<u64>>,
}

impl IndexReader {
    /// Nodes indexed under `values`, ascending.
    pub fn lookup(&self, values: &[PropValue]) -> Result<Vec<NodeId>> {
        let key = tuple_key(values)?;
        Ok(self
            .entries
            .get(&key)
            .map(|nodes| nodes.iter().copied().map(NodeId).collect())
            .unwrap_or_default())
    }

    /// Number of (value tuple, node) entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.values().map(|nodes| nodes.len() as u64).sum()
    }

    /// Population state.
    pub fn state(&self) -> InternalIndexState {
        self.state
    }

    /// Failure message of a failed population.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Index descriptor.
    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }
}
