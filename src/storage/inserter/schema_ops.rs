use crate::storage::catalog::TokenKind;
use crate::storage::schema::{
    IndexRule, LabelSchemaDescriptor, RelTypeSchemaDescriptor, SchemaRule, SchemaWriter,
};
use crate::types::{BatchError, LabelId, PropertyKeyId, Result, RuleId, TypeId};

use super::BatchInserter;

/// Builder for a deferred index, populated when the session closes.
pub struct IndexCreator<'a> {
    inserter: &'a mut BatchInserter,
    label: String,
    keys: Vec<String>,
}

impl IndexCreator<'_> {
    /// Adds a property key; composite indexes list several.
    pub fn on(mut self, key: &str) -> Self {
        self.keys.push(key.to_owned());
        self
    }

    /// Validates and persists the index rule.
    pub fn create(self) -> Result<RuleId> {
        let descriptor = self.inserter.label_descriptor(&self.label, &self.keys)?;
        let provider = self.inserter.index_provider.descriptor();
        self.inserter
            .write_schema(|writer| writer.create_index(descriptor, provider))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Assertion {
    Unique,
    Exists,
}

/// Builder for a constraint on a label; pick the assertion next.
pub struct ConstraintCreator<'a> {
    inserter: &'a mut BatchInserter,
    label: String,
}

impl<'a> ConstraintCreator<'a> {
    /// Nodes with the label must hold distinct values for `key`.
    pub fn assert_property_is_unique(self, key: &str) -> ConstraintDefinitionCreator<'a> {
        self.assert(Assertion::Unique, key)
    }

    /// Nodes with the label must have `key`.
    pub fn assert_property_exists(self, key: &str) -> ConstraintDefinitionCreator<'a> {
        self.assert(Assertion::Exists, key)
    }

    fn assert(self, assertion: Assertion, key: &str) -> ConstraintDefinitionCreator<'a> {
        ConstraintDefinitionCreator {
            inserter: self.inserter,
            label: self.label,
            key: key.to_owned(),
            assertion,
        }
    }
}

/// A fully described constraint, ready to be created.
pub struct ConstraintDefinitionCreator<'a> {
    inserter: &'a mut BatchInserter,
    label: String,
    key: String,
    assertion: Assertion,
}

impl ConstraintDefinitionCreator<'_> {
    /// Validates and persists the constraint rule.
    ///
    /// A uniqueness constraint also persists its backing index; the returned
    /// id is the constraint's.
    pub fn create(self) -> Result<RuleId> {
        let keys = [self.key];
        let descriptor = self.inserter.label_descriptor(&self.label, &keys)?;
        match self.assertion {
            Assertion::Unique => {
                let provider = self.inserter.index_provider.descriptor();
                self.inserter.write_schema(|writer| {
                    writer.create_uniqueness_constraint(descriptor, provider)
                })
            }
            Assertion::Exists => self
                .inserter
                .write_schema(|writer| writer.create_node_existence_constraint(descriptor)),
        }
    }
}

impl BatchInserter {
    /// Starts a deferred index on `label`.
    pub fn create_deferred_schema_index(&mut self, label: &str) -> IndexCreator<'_> {
        IndexCreator {
            inserter: self,
            label: label.to_owned(),
            keys: Vec::new(),
        }
    }

    /// Starts a constraint on `label`.
    pub fn create_deferred_constraint(&mut self, label: &str) -> ConstraintCreator<'_> {
        ConstraintCreator {
            inserter: self,
            label: label.to_owned(),
        }
    }

    /// Relationships of `rel_type` must have `key`.
    pub fn create_relationship_existence_constraint(
        &mut self,
        rel_type: &str,
        key: &str,
    ) -> Result<RuleId> {
        self.ensure_open()?;
        let descriptor = RelTypeSchemaDescriptor {
            rel_type: TypeId(self.token_id(TokenKind::RelationshipType, rel_type)?),
            property_key: PropertyKeyId(self.token_id(TokenKind::PropertyKey, key)?),
        };
        self.write_schema(|writer| writer.create_relationship_existence_constraint(descriptor))
    }

    /// Always fails: schema rules cannot be dropped in batch mode.
    pub fn drop_index(&mut self, _label: &str, _keys: &[&str]) -> Result<()> {
        self.ensure_open()?;
        Err(BatchError::Unsupported("dropping indexes"))
    }

    /// Always fails: schema rules cannot be dropped in batch mode.
    pub fn drop_uniqueness_constraint(&mut self, _label: &str, _key: &str) -> Result<()> {
        self.ensure_open()?;
        Err(BatchError::Unsupported("dropping uniqueness constraints"))
    }

    /// Always fails: schema rules cannot be dropped in batch mode.
    pub fn drop_node_existence_constraint(&mut self, _label: &str, _key: &str) -> Result<()> {
        self.ensure_open()?;
        Err(BatchError::Unsupported("dropping node property existence constraints"))
    }

    /// Always fails: schema rules cannot be dropped in batch mode.
    pub fn drop_relationship_existence_constraint(
        &mut self,
        _rel_type: &str,
        _key: &str,
    ) -> Result<()> {
        self.ensure_open()?;
        Err(BatchError::Unsupported(
            "dropping relationship property existence constraints",
        ))
    }

    /// Every index rule, including the ones backing uniqueness constraints.
    pub fn index_rules(&self) -> Vec<IndexRule> {
        self.schema.index_rules().cloned().collect()
    }

    /// Every constraint rule.
    pub fn constraint_rules(&self) -> Vec<SchemaRule> {
        self.schema.constraint_rules().cloned().collect()
    }

    fn label_descriptor(&mut self, label: &str, keys: &[String]) -> Result<LabelSchemaDescriptor> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Err(BatchError::Invalid(format!(
                "schema rule on label '{label}' names no property key"
            )));
        }
        let label = LabelId(self.token_id(TokenKind::Label, label)?);
        let keys = keys
            .iter()
            .map(|key| self.token_id(TokenKind::PropertyKey, key).map(PropertyKeyId))
            .collect::<Result<Vec<_>>>()?;
        Ok(LabelSchemaDescriptor::new(label, keys))
    }

    fn write_schema<F>(&mut self, create: F) -> Result<RuleId>
    where
        F: FnOnce(&mut SchemaWriter<'_>) -> Result<RuleId>,
    {
        let mut writer = SchemaWriter {
            cache: &mut self.schema,
            changes: &mut self.records.schema,
            store: &mut self.stores.schema,
        };
        let id = create(&mut writer)?;
        self.labels_touched = true;
        self.force_flush()?;
        Ok(id)
    }
}
