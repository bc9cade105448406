use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking bulk-load progress.
///
/// Implementations collect statistics about records written by the inserter:
/// nodes and relationships created, property chains written, commits and
/// indexes populated at close.
pub trait InserterMetrics: Send + Sync {
    /// Records the creation of a node.
    fn node_created(&self);

    /// Records the creation of a relationship.
    fn relationship_created(&self);

    /// Records a property chain being built or rewritten.
    fn property_chain_written(&self);

    /// Records a commit of the staged record set.
    ///
    /// # Parameters
    /// * `records` - Number of records made durable.
    /// * `forced` - Whether the commit was forced rather than batch-triggered.
    fn commit(&self, records: usize, forced: bool);

    /// Records an index that finished population at close.
    fn index_populated(&self, entries: u64);
}

/// A no-op implementation of [`InserterMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl InserterMetrics for NoopMetrics {
    fn node_created(&self) {}
    fn relationship_created(&self) {}
    fn property_chain_written(&self) {}
    fn commit(&self, _records: usize, _forced: bool) {}
    fn index_populated(&self, _entries: u64) {}
}

/// A thread-safe counter-based implementation of [`InserterMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of nodes created.
    pub nodes_created: AtomicU64,

    /// Number of relationships created.
    pub relationships_created: AtomicU64,

    /// Number of property chains written.
    pub property_chains_written: AtomicU64,

    /// Number of batch-triggered commits.
    pub batched_commits: AtomicU64,

    /// Number of forced commits.
    pub forced_commits: AtomicU64,

    /// Total records made durable by commits.
    pub records_committed: AtomicU64,

    /// Number of indexes populated.
    pub indexes_populated: AtomicU64,

    /// Total entries added to populated indexes.
    pub index_entries: AtomicU64,
}

impl InserterMetrics for CounterMetrics {
    fn node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn relationship_created(&self) {
        self.relationships_created.fetch_add(1, Ordering::Relaxed);
    }

    fn property_chain_written(&self) {
        self.property_chains_written.fetch_add(1, Ordering::Relaxed);
    }

    fn commit(&self, records: usize, forced: bool) {
        if forced {
            self.forced_commits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batched_commits.fetch_add(1, Ordering::Relaxed);
        }
        self.records_committed
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    fn index_populated(&self, entries: u64) {
        self.indexes_populated.fetch_add(1, Ordering::Relaxed);
        self.index_entries.fetch_add(entries, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which discards everything.
pub fn default_metrics() -> Arc<dyn InserterMetrics> {
    Arc::new(NoopMetrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_split_forced_and_batched_commits() {
        let metrics = CounterMetrics::default();
        metrics.commit(10, false);
        metrics.commit(3, true);
        metrics.node_created();
        metrics.index_populated(7);
        assert_eq!(metrics.batched_commits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.forced_commits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.records_committed.load(Ordering::Relaxed), 13);
        assert_eq!(metrics.nodes_created.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.index_entries.load(Ordering::Relaxed), 7);
    }
}
