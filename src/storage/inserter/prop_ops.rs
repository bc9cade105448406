use std::collections::BTreeMap;

use crate::storage::catalog::TokenKind;
use crate::storage::chain;
use crate::storage::types::PropValue;
use crate::types::{NodeId, PropertyKeyId, RelationshipId, Result};

use super::BatchInserter;

impl BatchInserter {
    /// Replaces every property of the node with `properties`.
    pub fn set_node_properties(&mut self, node: NodeId, properties: &[(&str, PropValue)]) -> Result<()> {
        self.ensure_open()?;
        let entries = self.property_entries(properties)?;
        let record = self
            .records
            .nodes
            .get_or_load(node.0, &self.stores.nodes)?
            .for_changing();
        chain::replace_chain(
            record,
            entries,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.metrics.property_chain_written();
        self.flush()
    }

    /// Sets one node property, adding or replacing it.
    pub fn set_node_property(&mut self, node: NodeId, key: &str, value: PropValue) -> Result<()> {
        self.ensure_open()?;
        let key = PropertyKeyId(self.token_id(TokenKind::PropertyKey, key)?);
        let record = self
            .records
            .nodes
            .get_or_load(node.0, &self.stores.nodes)?
            .for_changing();
        chain::set_property(
            record,
            key,
            &value,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.flush()
    }

    /// Removes one node property; fails with `NotFound` when it is absent.
    pub fn remove_node_property(&mut self, node: NodeId, key: &str) -> Result<()> {
        self.ensure_open()?;
        let key = PropertyKeyId(self.token_id(TokenKind::PropertyKey, key)?);
        let record = self
            .records
            .nodes
            .get_or_load(node.0, &self.stores.nodes)?
            .for_changing();
        chain::remove_property(
            record,
            key,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.flush()
    }

    /// Whether the node has a value for `key`.
    pub fn node_has_property(&self, node: NodeId, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let head = self.records.nodes.peek(node.0, &self.stores.nodes)?.next_prop;
        self.chain_has_property(head, key)
    }

    /// Every property of the node, by key name.
    pub fn get_node_properties(&self, node: NodeId) -> Result<BTreeMap<String, PropValue>> {
        self.ensure_open()?;
        let head = self.records.nodes.peek(node.0, &self.stores.nodes)?.next_prop;
        self.chain_properties(head)
    }

    /// Replaces every property of the relationship with `properties`.
    pub fn set_relationship_properties(
        &mut self,
        rel: RelationshipId,
        properties: &[(&str, PropValue)],
    ) -> Result<()> {
        self.ensure_open()?;
        let entries = self.property_entries(properties)?;
        let record = self
            .records
            .relationships
            .get_or_load(rel.0, &self.stores.relationships)?
            .for_changing();
        chain::replace_chain(
            record,
            entries,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.metrics.property_chain_written();
        self.flush()
    }

    /// Sets one relationship property, adding or replacing it.
    pub fn set_relationship_property(
        &mut self,
        rel: RelationshipId,
        key: &str,
        value: PropValue,
    ) -> Result<()> {
        self.ensure_open()?;
        let key = PropertyKeyId(self.token_id(TokenKind::PropertyKey, key)?);
        let record = self
            .records
            .relationships
            .get_or_load(rel.0, &self.stores.relationships)?
            .for_changing();
        chain::set_property(
            record,
            key,
            &value,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.flush()
    }

    /// Removes one relationship property; fails with `NotFound` when it is absent.
    pub fn remove_relationship_property(&mut self, rel: RelationshipId, key: &str) -> Result<()> {
        self.ensure_open()?;
        let key = PropertyKeyId(self.token_id(TokenKind::PropertyKey, key)?);
        let record = self
            .records
            .relationships
            .get_or_load(rel.0, &self.stores.relationships)?
            .for_changing();
        chain::remove_property(
            record,
            key,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        self.flush()
    }

    /// Whether the relationship has a value for `key`.
    pub fn relationship_has_property(&self, rel: RelationshipId, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let head = self
            .records
            .relationships
            .peek(rel.0, &self.stores.relationships)?
            .next_prop;
        self.chain_has_property(head, key)
    }

    /// Every property of the relationship, by key name.
    pub fn get_relationship_properties(
        &self,
        rel: RelationshipId,
    ) -> Result<BTreeMap<String, PropValue>> {
        self.ensure_open()?;
        let head = self
            .records
            .relationships
            .peek(rel.0, &self.stores.relationships)?
            .next_prop;
        self.chain_properties(head)
    }

    fn chain_has_property(&self, head: Option<u64>, key: &str) -> Result<bool> {
        let Some(key) = self.tokens.id_of(TokenKind::PropertyKey, key) else {
            return Ok(false);
        };
        let found = chain::find_property(
            head,
            PropertyKeyId(key),
            &self.records.properties,
            &self.stores.properties,
        )?;
        Ok(found.is_some())
    }

    fn chain_properties(&self, head: Option<u64>) -> Result<BTreeMap<String, PropValue>> {
        let mut out = BTreeMap::new();
        for (key, value) in chain::read_all(head, &self.records.properties, &self.stores.properties)? {
            let name = self.tokens.name_of(TokenKind::PropertyKey, key.0)?;
            out.insert(name.to_owned(), value);
        }
        Ok(out)
    }
}
