//! The batch inserter session.
//!
//! A session owns every store of one store directory for its whole lifetime.
//! Mutations are staged in a [`RecordSet`] and made durable by the flush
//! strategy; index population happens once, in [`BatchInserter::shutdown`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::primitives::lock::StoreLocker;
use crate::types::{BatchError, LabelId, PropertyKeyId, Result, TypeId};

use super::catalog::TokenKind;
use super::catalog::TokenTable;
use super::counts::CountsStore;
use super::flush::{BatchedFlushStrategy, FlushStrategy};
use super::index::{IndexProvider, LabelScanStore, NativeIndexProvider, NativeLabelScanStore};
use super::metrics::{default_metrics, InserterMetrics};
use super::options::InserterOptions;
use super::schema::SchemaCache;
use super::staged::RecordSet;
use super::stores::Stores;
use super::types::PropValue;

mod node_ops;
mod prop_ops;
mod rel_ops;
mod schema_ops;
mod shutdown;

pub use schema_ops::{ConstraintCreator, ConstraintDefinitionCreator, IndexCreator};

/// Single-writer bulk loader over one store directory.
pub struct BatchInserter {
    options: InserterOptions,
    stores: Stores,
    records: RecordSet,
    tokens: TokenTable,
    schema: SchemaCache,
    flush: Box<dyn FlushStrategy>,
    metrics: Arc<dyn InserterMetrics>,
    index_provider: Box<dyn IndexProvider>,
    label_scan: Box<dyn LabelScanStore>,
    counts: CountsStore,
    locker: StoreLocker,
    labels_touched: bool,
    shut_down: bool,
}

impl BatchInserter {
    /// Opens `store_dir` with default options.
    pub fn open(store_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(store_dir, InserterOptions::default())
    }

    /// Opens (creating when needed) `store_dir` and locks it for this session.
    pub fn open_with(store_dir: impl AsRef<Path>, options: InserterOptions) -> Result<Self> {
        let dir = store_dir.as_ref();
        options.validate()?;
        fs::create_dir_all(dir)?;
        let locker = StoreLocker::acquire(dir)?;
        let stores = Stores::open(dir, &options)?;
        let tokens = TokenTable::open(&stores.tokens)?;
        let schema = SchemaCache::load(&stores.schema)?;
        let counts = CountsStore::open(dir)?;
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        if options.dump_configuration {
            options.dump();
        }
        info!(
            dir = %dir.display(),
            nodes = stores.nodes.len(),
            relationships = stores.relationships.len(),
            schema_rules = stores.schema.len(),
            "batch.open"
        );
        Ok(Self {
            flush: Box::new(BatchedFlushStrategy::new(options.batch_size)),
            index_provider: Box::new(NativeIndexProvider::new(dir)),
            label_scan: Box::new(NativeLabelScanStore::new(dir)),
            options,
            stores,
            records: RecordSet::default(),
            tokens,
            schema,
            metrics,
            counts,
            locker,
            labels_touched: false,
            shut_down: false,
        })
    }

    /// Store directory of this session.
    pub fn store_dir(&self) -> &Path {
        self.stores.dir()
    }

    /// One past the highest node id handed out or written.
    pub fn node_high_id(&self) -> u64 {
        self.stores.nodes.high_id()
    }

    /// One past the highest relationship id handed out or written.
    pub fn relationship_high_id(&self) -> u64 {
        self.stores.relationships.high_id()
    }

    /// Commits every staged change now.
    pub fn force_flush_changes(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.force_flush()
    }

    /// Id of the property key `name`, created on first use.
    pub fn get_or_create_property_key_id(&mut self, name: &str) -> Result<PropertyKeyId> {
        self.ensure_open()?;
        self.token_id(TokenKind::PropertyKey, name).map(PropertyKeyId)
    }

    /// Id of the label `name`, created on first use.
    pub fn get_or_create_label_id(&mut self, name: &str) -> Result<LabelId> {
        self.ensure_open()?;
        self.token_id(TokenKind::Label, name).map(LabelId)
    }

    /// Id of the relationship type `name`, created on first use.
    pub fn get_or_create_relationship_type_id(&mut self, name: &str) -> Result<TypeId> {
        self.ensure_open()?;
        self.token_id(TokenKind::RelationshipType, name).map(TypeId)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shut_down {
            return Err(BatchError::ShutDown);
        }
        Ok(())
    }

    fn token_id(&mut self, kind: TokenKind, name: &str) -> Result<u32> {
        self.tokens.get_or_create(kind, name, &mut self.stores.tokens)
    }

    fn label_ids(&mut self, labels: &[&str]) -> Result<Vec<LabelId>> {
        labels
            .iter()
            .map(|name| self.token_id(TokenKind::Label, name).map(LabelId))
            .collect()
    }

    fn property_entries(
        &mut self,
        properties: &[(&str, PropValue)],
    ) -> Result<Vec<(PropertyKeyId, PropValue)>> {
        properties
            .iter()
            .map(|(name, value)| {
                self.token_id(TokenKind::PropertyKey, name)
                    .map(|id| (PropertyKeyId(id), value.clone()))
            })
            .collect()
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(stats) = self.flush.flush(&mut self.records, &mut self.stores)? {
            self.metrics.commit(stats.total(), false);
        }
        Ok(())
    }

    fn force_flush(&mut self) -> Result<()> {
        let stats = self.flush.force_flush(&mut self.records, &mut self.stores)?;
        self.metrics.commit(stats.total(), true);
        Ok(())
    }
}
