//! Node and relationship counts, rebuilt from scratch when a session closes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::store::{read_store_file, write_store_file};
use crate::types::{LabelId, Result, TypeId};

use super::labels;
use super::stores::Stores;

/// File name of the counts store inside a store directory.
pub const COUNTS_FILE: &str = "counts.db";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Counts {
    nodes: u64,
    nodes_by_label: BTreeMap<LabelId, u64>,
    relationships: u64,
    relationships_by_type: BTreeMap<TypeId, u64>,
}

/// Counts kept in `<store>/counts.db`.
pub struct CountsStore {
    path: PathBuf,
    counts: Counts,
    rebuilding: bool,
}

impl CountsStore {
    /// Loads the counts of `store_dir`; a missing file means all zero.
    pub fn open(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(COUNTS_FILE);
        let counts = read_store_file(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            counts,
            rebuilding: false,
        })
    }

    /// Discards the current counts ahead of a rebuild.
    pub fn start(&mut self) {
        self.counts = Counts::default();
        self.rebuilding = true;
    }

    /// Whether `start` was called without a completed rebuild.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding
    }

    /// Nodes in total, or carrying `label`.
    pub fn node_count(&self, label: Option<LabelId>) -> u64 {
        match label {
            None => self.counts.nodes,
            Some(label) => self.counts.nodes_by_label.get(&label).copied().unwrap_or(0),
        }
    }

    /// Relationships in total, or of `rel_type`.
    pub fn relationship_count(&self, rel_type: Option<TypeId>) -> u64 {
        match rel_type {
            None => self.counts.relationships,
            Some(rel_type) => self
                .counts
                .relationships_by_type
                .get(&rel_type)
                .copied()
                .unwrap_or(0),
        }
    }

    /// Writes the counts file.
    pub fn save(&self) -> Result<()> {
        write_store_file(&self.path, &self.counts)
    }
}

/// Recomputes counts by visiting every in-use node and relationship.
pub struct CountsComputer<'a> {
    stores: &'a Stores,
}

impl<'a> CountsComputer<'a> {
    /// Computer reading `stores`.
    pub fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Fills `counts` from the durable stores and persists them.
    pub fn recompute(&self, counts: &mut CountsStore) -> Result<()> {
        let mut fresh = Counts::default();
        for node in self.stores.nodes.iter_in_use() {
            fresh.nodes += 1;
            for label in labels::read_all(node, &self.stores.node_labels)? {
                *fresh.nodes_by_label.entry(label).or_default() += 1;
            }
        }
        for rel in self.stores.relationships.iter_in_use() {
            fresh.relationships += 1;
            *fresh.relationships_by_type.entry(rel.rel_type).or_default() += 1;
        }
        debug!(
            nodes = fresh.nodes,
            relationships = fresh.relationships,
            "counts.recompute"
        );
        counts.counts = fresh;
        counts.rebuilding = false;
        counts.save()
    }
}
