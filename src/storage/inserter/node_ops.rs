use crate::storage::catalog::TokenKind;
use crate::storage::chain;
use crate::storage::labels;
use crate::storage::types::{PropValue, PropertyOwner};
use crate::types::{BatchError, LabelId, NodeId, Result};

use super::BatchInserter;

impl BatchInserter {
    /// Creates a node with the next free id.
    pub fn create_node(&mut self, properties: &[(&str, PropValue)], labels: &[&str]) -> Result<NodeId> {
        self.ensure_open()?;
        let id = self.stores.nodes.next_id()?;
        self.internal_create_node(id, properties, labels)?;
        Ok(NodeId(id))
    }

    /// Creates a node under a caller-chosen id.
    ///
    /// The id must not exceed the configured maximum and must be unused; the
    /// id sequence is moved past it.
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        properties: &[(&str, PropValue)],
        labels: &[&str],
    ) -> Result<()> {
        self.ensure_open()?;
        if id.0 > self.options.max_node_id {
            return Err(BatchError::InvalidId {
                kind: "node",
                id: id.0,
            });
        }
        if self.records.nodes.is_in_use(id.0, &self.stores.nodes) {
            return Err(BatchError::IdInUse {
                kind: "node",
                id: id.0,
            });
        }
        self.stores.nodes.set_highest_possible_id_in_use(id.0);
        self.internal_create_node(id.0, properties, labels)
    }

    fn internal_create_node(
        &mut self,
        id: u64,
        properties: &[(&str, PropValue)],
        labels: &[&str],
    ) -> Result<()> {
        let entries = self.property_entries(properties)?;
        let label_ids = self.label_ids(labels)?;

        let node = self.records.nodes.create(id, &self.stores.nodes)?;
        let head = chain::create_chain(
            PropertyOwner::Node(id),
            entries,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        node.next_prop = head;
        if !label_ids.is_empty() {
            labels::merge(
                node,
                &label_ids,
                &mut self.stores.node_labels,
                self.options.inline_label_capacity,
            )?;
            self.labels_touched = true;
        }

        self.metrics.node_created();
        if head.is_some() {
            self.metrics.property_chain_written();
        }
        self.flush()
    }

    /// Whether `node` exists in the durable store, after a forced flush.
    pub fn node_exists(&mut self, node: NodeId) -> Result<bool> {
        self.ensure_open()?;
        self.force_flush()?;
        Ok(self.stores.nodes.is_in_use(node.0))
    }

    /// Adds `labels` to the node's label set; labels already present are kept once.
    pub fn set_node_labels(&mut self, node: NodeId, labels: &[&str]) -> Result<()> {
        self.ensure_open()?;
        let label_ids = self.label_ids(labels)?;
        let record = self
            .records
            .nodes
            .get_or_load(node.0, &self.stores.nodes)?
            .for_changing();
        labels::merge(
            record,
            &label_ids,
            &mut self.stores.node_labels,
            self.options.inline_label_capacity,
        )?;
        self.labels_touched = true;
        self.flush()
    }

    /// Names of the node's labels, in label id order.
    pub fn get_node_labels(&self, node: NodeId) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.node_label_ids(node)?
            .into_iter()
            .map(|label| {
                self.tokens
                    .name_of(TokenKind::Label, label.0)
                    .map(str::to_owned)
            })
            .collect()
    }

    /// Whether the node carries `label`; an unknown label is never carried.
    pub fn node_has_label(&self, node: NodeId, label: &str) -> Result<bool> {
        self.ensure_open()?;
        let record = self.records.nodes.peek(node.0, &self.stores.nodes)?;
        match self.tokens.id_of(TokenKind::Label, label) {
            Some(id) => labels::contains(&record, LabelId(id), &self.stores.node_labels),
            None => Ok(false),
        }
    }

    pub(super) fn node_label_ids(&self, node: NodeId) -> Result<Vec<LabelId>> {
        let record = self.records.nodes.peek(node.0, &self.stores.nodes)?;
        labels::read_all(&record, &self.stores.node_labels)
    }
}
