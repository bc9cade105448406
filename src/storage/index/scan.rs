//! Full scan of the durable node store feeding index and label-scan population.

use crate::storage::chain;
use crate::storage::labels;
use crate::storage::schema::LabelSchemaDescriptor;
use crate::storage::staged::RecordChanges;
use crate::storage::stores::Stores;
use crate::storage::types::PropValue;
use crate::types::{LabelId, NodeId, PropertyKeyId, Result};

use super::types::{IndexEntryUpdate, NodeLabelUpdate};

/// Labels and filtered properties of one scanned node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdates {
    /// Scanned node.
    pub node: NodeId,
    /// Every label of the node, sorted.
    pub labels: Vec<LabelId>,
    /// Properties whose key passed the key filter.
    pub properties: Vec<(PropertyKeyId, PropValue)>,
}

impl NodeUpdates {
    fn value_of(&self, key: PropertyKeyId) -> Option<&PropValue> {
        self.properties
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Entry for `descriptor` when the node has its label and every key.
    pub fn for_index(&self, descriptor: &LabelSchemaDescriptor) -> Option<IndexEntryUpdate> {
        if self.labels.binary_search(&descriptor.label).is_err() {
            return None;
        }
        let values = descriptor
            .property_keys
            .iter()
            .map(|key| self.value_of(*key).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(IndexEntryUpdate {
            node: self.node,
            values,
        })
    }

    /// Entries for every matching descriptor, paired with its position.
    pub fn for_indexes(&self, descriptors: &[LabelSchemaDescriptor]) -> Vec<(usize, IndexEntryUpdate)> {
        descriptors
            .iter()
            .enumerate()
            .filter_map(|(i, descriptor)| self.for_index(descriptor).map(|update| (i, update)))
            .collect()
    }
}

/// Counters of one completed scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// In-use nodes visited.
    pub nodes: u64,
    /// Nodes with at least one label.
    pub labelled: u64,
    /// Nodes handed to the property visitor.
    pub property_updates: u64,
}

/// Scanner over every in-use node of the durable stores.
///
/// Staged changes are not visible; callers flush before scanning.
pub struct NodeStoreScan<'a> {
    stores: &'a Stores,
    labels: Vec<LabelId>,
    keys: Vec<PropertyKeyId>,
}

impl<'a> NodeStoreScan<'a> {
    /// Scan feeding properties only for nodes with one of `labels`, restricted to `keys`.
    pub fn new(stores: &'a Stores, mut labels: Vec<LabelId>, mut keys: Vec<PropertyKeyId>) -> Self {
        labels.sort_unstable();
        labels.dedup();
        keys.sort_unstable();
        keys.dedup();
        Self {
            stores,
            labels,
            keys,
        }
    }

    /// Visits every node in id order.
    ///
    /// `label_visitor` sees every labelled node, `property_visitor` only the
    /// nodes matching the label filter that hold at least one filtered key.
    pub fn run<P, L>(&self, mut property_visitor: P, mut label_visitor: L) -> Result<ScanStats>
    where
        P: FnMut(NodeUpdates) -> Result<()>,
        L: FnMut(NodeLabelUpdate) -> Result<()>,
    {
        let mut stats = ScanStats::default();
        let no_staged = RecordChanges::default();
        for node in self.stores.nodes.iter_in_use() {
            stats.nodes += 1;
            let node_labels = labels::read_all(node, &self.stores.node_labels)?;
            if node_labels.is_empty() {
                continue;
            }
            stats.labelled += 1;

            let wanted = node_labels
                .iter()
                .any(|label| self.labels.binary_search(label).is_ok());
            if wanted {
                let properties: Vec<(PropertyKeyId, PropValue)> =
                    chain::read_all(node.next_prop, &no_staged, &self.stores.properties)?
                        .into_iter()
                        .filter(|(key, _)| self.keys.binary_search(key).is_ok())
                        .collect();
                if !properties.is_empty() {
                    stats.property_updates += 1;
                    property_visitor(NodeUpdates {
                        node: NodeId(node.id),
                        labels: node_labels.clone(),
                        properties,
                    })?;
                }
            }

            label_visitor(NodeLabelUpdate {
                node: NodeId(node.id),
                labels_before: Vec::new(),
                labels_after: node_labels,
            })?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::options::InserterOptions;
    use crate::storage::staged::RecordSet;
    use crate::storage::types::PropertyOwner;
    use tempfile::tempdir;

    fn person_name() -> LabelSchemaDescriptor {
        LabelSchemaDescriptor::new(LabelId(0), vec![PropertyKeyId(0)])
    }

    #[test]
    fn for_indexes_requires_label_and_every_key() {
        let updates = NodeUpdates {
            node: NodeId(4),
            labels: vec![LabelId(0), LabelId(2)],
            properties: vec![(PropertyKeyId(0), PropValue::Str("Alice".into()))],
        };
        let composite = LabelSchemaDescriptor::new(LabelId(0), vec![PropertyKeyId(0), PropertyKeyId(1)]);
        let other_label = LabelSchemaDescriptor::new(LabelId(1), vec![PropertyKeyId(0)]);
        let matched = updates.for_indexes(&[composite, person_name(), other_label]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].0, 1);
        assert_eq!(matched[0].1.values, vec![PropValue::Str("Alice".into())]);
    }

    #[test]
    fn scan_filters_properties_and_reports_all_labels() -> Result<()> {
        let dir = tempdir()?;
        let opts = InserterOptions::default();
        let mut stores = Stores::open(dir.path(), &opts)?;
        let mut records = RecordSet::default();
        for (labels, name) in [(vec![LabelId(0)], Some("Alice")), (vec![LabelId(1)], Some("Bob")), (vec![], None)] {
            let id = stores.nodes.next_id()?;
            let head = match name {
                Some(name) => chain::create_chain(
                    PropertyOwner::Node(id),
                    vec![
                        (PropertyKeyId(0), PropValue::from(name)),
                        (PropertyKeyId(1), PropValue::Int(30)),
                    ],
                    &mut records.properties,
                    &mut stores.properties,
                )?,
                None => None,
            };
            let node = records.nodes.create(id, &stores.nodes)?;
            node.next_prop = head;
            labels::merge(node, &labels, &mut stores.node_labels, opts.inline_label_capacity)?;
        }
        records.commit(&mut stores)?;

        let scan = NodeStoreScan::new(&stores, vec![LabelId(0)], vec![PropertyKeyId(0)]);
        let mut seen = Vec::new();
        let mut labelled = Vec::new();
        let stats = scan.run(
            |updates| {
                seen.push(updates);
                Ok(())
            },
            |update| {
                labelled.push(update.node);
                Ok(())
            },
        )?;
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.labelled, 2);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].node, NodeId(0));
        assert_eq!(seen[0].properties, vec![(PropertyKeyId(0), PropValue::Str("Alice".into()))]);
        assert_eq!(labelled, vec![NodeId(0), NodeId(1)]);
        Ok(())
    }
}
