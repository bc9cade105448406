use tracing::{debug, info, warn};

use crate::storage::catalog::{TokenKind, TokenTable};
use crate::storage::chain;
use crate::storage::counts::CountsComputer;
use crate::storage::index::{
    IndexDescriptor, IndexPopulator, IndexProvider, InternalIndexState, LabelScanStore,
    NodePropertyAccessor, NodeStoreScan,
};
use crate::storage::metrics::InserterMetrics;
use crate::storage::record::PropertyRecord;
use crate::storage::schema::{IndexRule, LabelSchemaDescriptor};
use crate::storage::staged::RecordChanges;
use crate::storage::stores::Stores;
use crate::storage::types::PropValue;
use crate::types::{BatchError, NodeId, PropertyKeyId, Result, RuleId};

use super::BatchInserter;

struct PendingIndex {
    rule: RuleId,
    descriptor: LabelSchemaDescriptor,
    populator: Box<dyn IndexPopulator>,
    entries: u64,
    open: bool,
}

/// Reads properties straight from the durable stores.
struct StoreNodeAccessor<'a> {
    stores: &'a Stores,
    no_staged: RecordChanges<PropertyRecord>,
}

impl NodePropertyAccessor for StoreNodeAccessor<'_> {
    fn get_property_value(&self, node: NodeId, key: PropertyKeyId) -> Result<Option<PropValue>> {
        let head = self.stores.nodes.get_record(node.0)?.next_prop;
        chain::read_property(head, key, &self.no_staged, &self.stores.properties)
    }
}

impl BatchInserter {
    /// Closes the session: flushes, rebuilds counts, populates every
    /// non-failed index and releases the store.
    ///
    /// The stores are persisted and the lock released even when population
    /// fails; the first error is returned. Every later call fails.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(BatchError::AlreadyShutDown);
        }
        self.shut_down = true;
        let outcome = self.close_pipeline();
        let closed = self.close_stores();
        outcome.and(closed)
    }

    fn close_pipeline(&mut self) -> Result<()> {
        self.force_flush()?;
        self.counts.start();
        CountsComputer::new(&self.stores).recompute(&mut self.counts)?;
        if !self.labels_touched {
            return Ok(());
        }
        repopulate_all_indexes(
            &self.stores,
            &self.tokens,
            self.index_provider.as_ref(),
            self.label_scan.as_ref(),
            self.schema.index_rules().cloned().collect(),
            self.metrics.as_ref(),
        )
    }

    fn close_stores(&mut self) -> Result<()> {
        self.records.close();
        let saved = self.stores.save();
        let released = self.locker.release();
        saved.and(released)?;
        let tokens = self.tokens.metrics_snapshot();
        debug!(
            lookups = tokens.lookup_calls,
            created = tokens.created,
            hit_rate = tokens.hit_rate(),
            "catalog.metrics"
        );
        info!(dir = %self.stores.dir().display(), "batch.shutdown");
        Ok(())
    }
}

fn repopulate_all_indexes(
    stores: &Stores,
    tokens: &TokenTable,
    provider: &dyn IndexProvider,
    label_scan: &dyn LabelScanStore,
    rules: Vec<IndexRule>,
    metrics: &dyn InserterMetrics,
) -> Result<()> {
    let mut pending: Vec<PendingIndex> = Vec::new();
    for rule in rules {
        let index = IndexDescriptor::from_rule(&rule);
        if provider.initial_state(rule.id, &index)? == InternalIndexState::Failed {
            warn!(rule = rule.id.0, index = %index, "index.populate.skip_failed");
            continue;
        }
        let populator = provider.populator(rule.id, &index)?;
        pending.push(PendingIndex {
            rule: rule.id,
            descriptor: rule.descriptor,
            populator,
            entries: 0,
            open: true,
        });
    }

    let result = populate(stores, tokens, label_scan, &mut pending);
    if let Err(err) = &result {
        let reason = err.to_string();
        for index in pending.iter_mut().filter(|index| index.open) {
            let _ = index.populator.mark_as_failed(&reason);
            let _ = index.populator.close(false);
            index.open = false;
            warn!(rule = index.rule.0, reason = %reason, "index.populate.failed");
        }
        return result;
    }

    for index in &pending {
        metrics.index_populated(index.entries);
    }
    info!(
        indexes = pending.len(),
        entries = pending.iter().map(|index| index.entries).sum::<u64>(),
        "index.populate.done"
    );
    Ok(())
}

fn populate(
    stores: &Stores,
    tokens: &TokenTable,
    label_scan: &dyn LabelScanStore,
    pending: &mut [PendingIndex],
) -> Result<()> {
    for index in pending.iter_mut() {
        index.populator.create()?;
    }

    let descriptors: Vec<LabelSchemaDescriptor> =
        pending.iter().map(|index| index.descriptor.clone()).collect();
    let labels = descriptors.iter().map(|d| d.label).collect();
    let keys = descriptors
        .iter()
        .flat_map(|d| d.property_keys.iter().copied())
        .collect();

    let mut writer = label_scan.new_writer()?;
    let scan = NodeStoreScan::new(stores, labels, keys);
    scan.run(
        |updates| {
            for (i, update) in updates.for_indexes(&descriptors) {
                let index = &mut pending[i];
                index
                    .populator
                    .add(std::slice::from_ref(&update))
                    .map_err(|err| describe_conflict(err, &index.descriptor, tokens))?;
                index.entries += 1;
            }
            Ok(())
        },
        |update| writer.write(update),
    )?;

    let accessor = StoreNodeAccessor {
        stores,
        no_staged: RecordChanges::default(),
    };
    for index in pending.iter_mut() {
        index
            .populator
            .verify_deferred_constraints(&accessor)
            .map_err(|err| describe_conflict(err, &index.descriptor, tokens))?;
        index.populator.close(true)?;
        index.open = false;
    }
    writer.close()
}

/// Rewrites a conflict to name the label and keys instead of their ids.
fn describe_conflict(
    err: BatchError,
    descriptor: &LabelSchemaDescriptor,
    tokens: &TokenTable,
) -> BatchError {
    match err {
        BatchError::IndexEntryConflict {
            value,
            existing_node,
            added_node,
            ..
        } => BatchError::IndexEntryConflict {
            descriptor: user_description(descriptor, tokens),
            value,
            existing_node,
            added_node,
        },
        other => other,
    }
}

fn user_description(descriptor: &LabelSchemaDescriptor, tokens: &TokenTable) -> String {
    let label = tokens
        .name_of(TokenKind::Label, descriptor.label.0)
        .map(str::to_owned)
        .unwrap_or_else(|_| descriptor.label.to_string());
    let keys: Vec<String> = descriptor
        .property_keys
        .iter()
        .map(|key| {
            tokens
                .name_of(TokenKind::PropertyKey, key.0)
                .map(str::to_owned)
                .unwrap_or_else(|_| key.to_string())
        })
        .collect();
    format!(":{}({})", label, keys.join(", "))
}
