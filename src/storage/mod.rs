//! Record-store engine and the batch inserter built on it.
//!
//! The inserter stages record changes in memory, commits them to the record
//! stores in batches and rebuilds counts, the label scan store and every
//! index when the session closes.

/// Token registries for labels, relationship types and property keys.
pub mod catalog;

/// Derived node and relationship counts.
pub mod counts;

/// Index providers, populators and the label scan store.
///
/// Indexes are populated in one pass over the node store at shutdown.
pub mod index;

/// Fixed-size record layouts.
pub mod record;

/// Schema rules, their descriptors and the in-memory rule cache.
pub mod schema;

/// The set of record stores backing one store directory.
pub mod stores;

mod chain;
mod flush;
mod inserter;
mod labels;
mod metrics;
mod options;
mod props;
mod relationship;
mod staged;
mod types;

/// Commit policies.
pub use flush::{BatchedFlushStrategy, FlushStrategy};

/// The inserter session and its schema builders.
pub use inserter::{BatchInserter, ConstraintCreator, ConstraintDefinitionCreator, IndexCreator};

/// Inserter instrumentation hooks.
pub use metrics::{default_metrics, CounterMetrics, InserterMetrics, NoopMetrics};

/// Session configuration and its parameter keys.
pub use options::{
    InserterOptions, DEFAULT_MAX_NODE_ID, PARAM_ALLOW_STORE_UPGRADE, PARAM_ARRAY_BLOCK_SIZE,
    PARAM_BATCH_SIZE, PARAM_DUMP_CONFIGURATION, PARAM_INLINE_LABEL_CAPACITY,
    PARAM_LABEL_BLOCK_SIZE, PARAM_MAX_NODE_ID, PARAM_NAME_BLOCK_SIZE,
    PARAM_SHORT_STRING_MAX_BYTES, PARAM_STRING_BLOCK_SIZE,
};

/// Staged record changes and commit statistics.
pub use staged::{CommitStats, RecordChange, RecordChanges, RecordSet};

/// Property values and the relationship view.
pub use types::{BatchRelationship, PropValue, PropertyOwner};
