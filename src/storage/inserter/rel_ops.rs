use crate::storage::catalog::TokenKind;
use crate::storage::chain;
use crate::storage::relationship;
use crate::storage::types::{BatchRelationship, PropValue, PropertyOwner};
use crate::types::{NodeId, RelationshipId, Result, TypeId};

use super::BatchInserter;

impl BatchInserter {
    /// Creates a relationship of type `rel_type` from `start` to `end`.
    ///
    /// Both nodes must exist, staged or durable.
    pub fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
        properties: &[(&str, PropValue)],
    ) -> Result<RelationshipId> {
        self.ensure_open()?;
        let type_id = TypeId(self.token_id(TokenKind::RelationshipType, rel_type)?);
        let entries = self.property_entries(properties)?;
        let id = self.stores.relationships.next_id()?;
        relationship::create_relationship(
            id,
            start.0,
            end.0,
            type_id,
            &mut self.records,
            &mut self.stores,
        )?;
        let head = chain::create_chain(
            PropertyOwner::Relationship(id),
            entries,
            &mut self.records.properties,
            &mut self.stores.properties,
        )?;
        if head.is_some() {
            self.records
                .relationships
                .get_or_load(id, &self.stores.relationships)?
                .for_changing()
                .next_prop = head;
            self.metrics.property_chain_written();
        }
        self.metrics.relationship_created();
        self.flush()?;
        Ok(RelationshipId(id))
    }

    /// Ids of every relationship touching `node`, after a forced flush.
    pub fn get_relationship_ids(&mut self, node: NodeId) -> Result<Vec<RelationshipId>> {
        self.ensure_open()?;
        self.force_flush()?;
        Ok(relationship::relationships_of(node.0, &self.records, &self.stores)?
            .into_iter()
            .map(|rel| RelationshipId(rel.id))
            .collect())
    }

    /// Every relationship touching `node`, after a forced flush.
    pub fn get_relationships(&mut self, node: NodeId) -> Result<Vec<BatchRelationship>> {
        self.ensure_open()?;
        self.force_flush()?;
        relationship::relationships_of(node.0, &self.records, &self.stores)?
            .into_iter()
            .map(|rel| self.batch_relationship(rel.id, rel.first_node, rel.second_node, rel.rel_type))
            .collect()
    }

    /// The relationship `id` with its endpoints and type name.
    pub fn get_relationship_by_id(&self, id: RelationshipId) -> Result<BatchRelationship> {
        self.ensure_open()?;
        let rel = self
            .records
            .relationships
            .peek(id.0, &self.stores.relationships)?;
        self.batch_relationship(rel.id, rel.first_node, rel.second_node, rel.rel_type)
    }

    fn batch_relationship(
        &self,
        id: u64,
        start: u64,
        end: u64,
        rel_type: TypeId,
    ) -> Result<BatchRelationship> {
        Ok(BatchRelationship {
            id: RelationshipId(id),
            start: NodeId(start),
            end: NodeId(end),
            rel_type: self
                .tokens
                .name_of(TokenKind::RelationshipType, rel_type.0)?
                .to_owned(),
        })
    }
}
