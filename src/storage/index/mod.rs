#![forbid(unsafe_code)]

//! Index collaborators populated once, when the inserter closes.

mod label;
mod native;
mod scan;
mod types;

pub use label::{LabelScanReader, NativeLabelScanStore};
pub use native::{IndexReader, NativeIndexProvider};
pub use scan::{NodeStoreScan, NodeUpdates, ScanStats};
pub use types::{
    render_values, IndexDescriptor, IndexEntryUpdate, InternalIndexState, NodeLabelUpdate,
    NodePropertyAccessor,
};

use crate::storage::schema::ProviderDescriptor;
use crate::types::{Result, RuleId};

/// Source of index populators for one index implementation.
pub trait IndexProvider {
    /// Identity written into index rules created against this provider.
    fn descriptor(&self) -> ProviderDescriptor;

    /// State the index of `rule` was left in.
    fn initial_state(&self, rule: RuleId, index: &IndexDescriptor) -> Result<InternalIndexState>;

    /// Populator that (re)builds the index of `rule` from scratch.
    fn populator(&self, rule: RuleId, index: &IndexDescriptor) -> Result<Box<dyn IndexPopulator>>;
}

/// Bulk builder for one index.
pub trait IndexPopulator {
    /// Discards previous contents and prepares for population.
    fn create(&mut self) -> Result<()>;

    /// Adds entries. Unique populators fail on a second node for a value tuple.
    fn add(&mut self, updates: &[IndexEntryUpdate]) -> Result<()>;

    /// Runs checks that need the complete index, reading nodes through `accessor`.
    fn verify_deferred_constraints(&mut self, accessor: &dyn NodePropertyAccessor) -> Result<()>;

    /// Finishes population; `populated` says whether it succeeded.
    fn close(&mut self, populated: bool) -> Result<()>;

    /// Records why population failed.
    fn mark_as_failed(&mut self, reason: &str) -> Result<()>;
}

/// Store mapping labels to the nodes carrying them.
pub trait LabelScanStore {
    /// Writer applying label updates.
    fn new_writer(&self) -> Result<Box<dyn LabelScanWriter>>;
}

/// Receives label updates for every labelled node.
pub trait LabelScanWriter {
    /// Applies one node's update.
    fn write(&mut self, update: NodeLabelUpdate) -> Result<()>;

    /// Makes the written updates durable.
    fn close(&mut self) -> Result<()>;
}
