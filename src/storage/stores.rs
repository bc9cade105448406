//! The set of record stores making up one store directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::primitives::store::{DynamicStore, RecordStore};
use crate::types::Result;

use super::catalog::TokenKind;
use super::options::InserterOptions;
use super::record::{
    NodeRecord, PropertyRecord, RelationshipGroupRecord, RelationshipRecord, SchemaRecord,
    TokenRecord,
};

const UNBOUNDED: u64 = u64::MAX - 1;
const TOKEN_MAX_ID: u64 = u32::MAX as u64 - 1;

/// Property records plus the overflow stores for long values.
pub struct PropertyStores {
    /// Property records.
    pub records: RecordStore<PropertyRecord>,
    /// Long strings and byte strings.
    pub strings: DynamicStore,
    /// Encoded arrays.
    pub arrays: DynamicStore,
    /// Inline limit for strings and byte strings.
    pub short_string_max_bytes: usize,
}

impl PropertyStores {
    /// Opens the property stores in `dir`.
    pub fn open(
        dir: &Path,
        short_string_max_bytes: usize,
        string_block_size: usize,
        array_block_size: usize,
        max_id: u64,
    ) -> Result<Self> {
        Ok(Self {
            records: RecordStore::open(dir, "properties.db", max_id)?,
            strings: DynamicStore::open(dir, "property_strings.db", string_block_size)?,
            arrays: DynamicStore::open(dir, "property_arrays.db", array_block_size)?,
            short_string_max_bytes,
        })
    }

    fn save(&self, dir: &Path) -> Result<()> {
        self.records.save(dir)?;
        self.strings.save(dir)?;
        self.arrays.save(dir)
    }
}

/// Token records of one kind plus their name store.
pub struct TokenStore {
    /// Token records.
    pub records: RecordStore<TokenRecord>,
    /// Token names.
    pub names: DynamicStore,
}

impl TokenStore {
    fn open(
        dir: &Path,
        records: &'static str,
        names: &'static str,
        name_block_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            records: RecordStore::open(dir, records, TOKEN_MAX_ID)?,
            names: DynamicStore::open(dir, names, name_block_size)?,
        })
    }

    fn save(&self, dir: &Path) -> Result<()> {
        self.records.save(dir)?;
        self.names.save(dir)
    }
}

/// Token stores for every token kind.
pub struct TokenStores {
    /// Property key tokens.
    pub property_keys: TokenStore,
    /// Label tokens.
    pub labels: TokenStore,
    /// Relationship type tokens.
    pub relationship_types: TokenStore,
}

impl TokenStores {
    /// Store for `kind`.
    pub fn get(&self, kind: TokenKind) -> &TokenStore {
        match kind {
            TokenKind::PropertyKey => &self.property_keys,
            TokenKind::Label => &self.labels,
            TokenKind::RelationshipType => &self.relationship_types,
        }
    }

    /// Mutable store for `kind`.
    pub fn get_mut(&mut self, kind: TokenKind) -> &mut TokenStore {
        match kind {
            TokenKind::PropertyKey => &mut self.property_keys,
            TokenKind::Label => &mut self.labels,
            TokenKind::RelationshipType => &mut self.relationship_types,
        }
    }
}

/// Every record store of a store directory.
pub struct Stores {
    dir: PathBuf,
    /// Node records.
    pub nodes: RecordStore<NodeRecord>,
    /// Overflow label sets of nodes.
    pub node_labels: DynamicStore,
    /// Relationship records.
    pub relationships: RecordStore<RelationshipRecord>,
    /// Relationship group records.
    pub groups: RecordStore<RelationshipGroupRecord>,
    /// Property records and value overflow.
    pub properties: PropertyStores,
    /// Schema rules.
    pub schema: RecordStore<SchemaRecord>,
    /// Token registries.
    pub tokens: TokenStores,
}

impl Stores {
    /// Opens (creating when needed) every store in `dir`.
    pub fn open(dir: &Path, opts: &InserterOptions) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let stores = Self {
            dir: dir.to_path_buf(),
            nodes: RecordStore::open(dir, "nodes.db", opts.max_node_id)?,
            node_labels: DynamicStore::open(dir, "node_labels.db", opts.label_block_size)?,
            relationships: RecordStore::open(dir, "relationships.db", UNBOUNDED)?,
            groups: RecordStore::open(dir, "relationship_groups.db", UNBOUNDED)?,
            properties: PropertyStores::open(
                dir,
                opts.short_string_max_bytes,
                opts.string_block_size,
                opts.array_block_size,
                UNBOUNDED,
            )?,
            schema: RecordStore::open(dir, "schema.db", UNBOUNDED)?,
            tokens: TokenStores {
                property_keys: TokenStore::open(
                    dir,
                    "property_keys.db",
                    "property_key_names.db",
                    opts.name_block_size,
                )?,
                labels: TokenStore::open(dir, "labels.db", "label_names.db", opts.name_block_size)?,
                relationship_types: TokenStore::open(
                    dir,
                    "relationship_types.db",
                    "relationship_type_names.db",
                    opts.name_block_size,
                )?,
            },
        };
        debug!(
            dir = %dir.display(),
            nodes = stores.nodes.len(),
            relationships = stores.relationships.len(),
            "stores.open"
        );
        Ok(stores)
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists every store.
    pub fn save(&self) -> Result<()> {
        let dir = self.dir.as_path();
        self.nodes.save(dir)?;
        self.node_labels.save(dir)?;
        self.relationships.save(dir)?;
        self.groups.save(dir)?;
        self.properties.save(dir)?;
        self.schema.save(dir)?;
        self.tokens.property_keys.save(dir)?;
        self.tokens.labels.save(dir)?;
        self.tokens.relationship_types.save(dir)?;
        debug!(dir = %dir.display(), "stores.save");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::store::Record;
    use tempfile::tempdir;

    #[test]
    fn saved_stores_reopen_with_their_records() -> Result<()> {
        let dir = tempdir()?;
        let opts = InserterOptions::default();
        let mut stores = Stores::open(dir.path(), &opts)?;
        let id = stores.nodes.next_id()?;
        let mut node = NodeRecord::unused(id);
        node.set_in_use(true);
        stores.nodes.update_record(node.clone())?;
        stores.save()?;
        assert!(dir.path().join("nodes.db").exists());
        assert!(dir.path().join("label_names.db").exists());

        let reopened = Stores::open(dir.path(), &opts)?;
        assert_eq!(reopened.nodes.get_record(id)?, node);
        assert_eq!(reopened.nodes.high_id(), 1);
        Ok(())
    }
}
