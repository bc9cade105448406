#![forbid(unsafe_code)]

//! Schema rules and the in-memory cache that validates new ones.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::store::RecordStore;
use crate::storage::record::SchemaRecord;
use crate::storage::staged::RecordChanges;
use crate::types::{BatchError, LabelId, PropertyKeyId, Result, RuleId, TypeId};

const INDEX_EXISTS: &str = "index for given {label;property} already exists";
const UNIQUE_ON_INDEXED: &str =
    "it is not allowed to create uniqueness constraints and indexes on the same {label;property}";
const NODE_EXISTENCE_EXISTS: &str =
    "node property existence constraint for given {label;property} already exists";
const REL_EXISTENCE_EXISTS: &str =
    "relationship property existence constraint for given {type;property} already exists";

/// A label together with an ordered list of property keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelSchemaDescriptor {
    /// Label the rule applies to.
    pub label: LabelId,
    /// Property keys, in index order.
    pub property_keys: Vec<PropertyKeyId>,
}

impl LabelSchemaDescriptor {
    /// Descriptor for `label` over `property_keys`.
    pub fn new(label: LabelId, property_keys: Vec<PropertyKeyId>) -> Self {
        Self {
            label,
            property_keys,
        }
    }
}

impl fmt::Display for LabelSchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.property_keys.iter().map(|k| k.to_string()).collect();
        write!(f, ":label[{}]({})", self.label, keys.join(", "))
    }
}

/// A relationship type together with one property key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelTypeSchemaDescriptor {
    /// Relationship type the rule applies to.
    pub rel_type: TypeId,
    /// Property key.
    pub property_key: PropertyKeyId,
}

/// Index implementation an index rule is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider key.
    pub key: String,
    /// Provider version.
    pub version: String,
}

impl Default for ProviderDescriptor {
    fn default() -> Self {
        Self {
            key: "native-btree".into(),
            version: "1.0".into(),
        }
    }
}

/// Persisted index rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRule {
    /// Rule id.
    pub id: RuleId,
    /// Indexed label and keys.
    pub descriptor: LabelSchemaDescriptor,
    /// Provider the index is populated by.
    pub provider: ProviderDescriptor,
    /// Uniqueness constraint owning this index, if any.
    pub owning_constraint: Option<RuleId>,
    /// Whether the index rejects duplicate value tuples.
    pub unique: bool,
}

/// Every schema rule kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaRule {
    /// Secondary index over node properties.
    Index(IndexRule),
    /// Uniqueness constraint backed by a unique index.
    UniquenessConstraint {
        /// Rule id.
        id: RuleId,
        /// Constrained label and keys.
        descriptor: LabelSchemaDescriptor,
        /// Backing index rule.
        owned_index: RuleId,
    },
    /// Nodes with the label must have the properties.
    NodeExistenceConstraint {
        /// Rule id.
        id: RuleId,
        /// Constrained label and keys.
        descriptor: LabelSchemaDescriptor,
    },
    /// Relationships of the type must have the property.
    RelationshipExistenceConstraint {
        /// Rule id.
        id: RuleId,
        /// Constrained type and key.
        descriptor: RelTypeSchemaDescriptor,
    },
}

impl SchemaRule {
    /// Rule id.
    pub fn id(&self) -> RuleId {
        match self {
            SchemaRule::Index(rule) => rule.id,
            SchemaRule::UniquenessConstraint { id, .. }
            | SchemaRule::NodeExistenceConstraint { id, .. }
            | SchemaRule::RelationshipExistenceConstraint { id, .. } => *id,
        }
    }

    /// Whether this is a constraint rather than an index.
    pub fn is_constraint(&self) -> bool {
        !matches!(self, SchemaRule::Index(_))
    }

    /// Short kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaRule::Index(rule) if rule.unique => "unique index",
            SchemaRule::Index(_) => "index",
            SchemaRule::UniquenessConstraint { .. } => "uniqueness constraint",
            SchemaRule::NodeExistenceConstraint { .. } => "node existence constraint",
            SchemaRule::RelationshipExistenceConstraint { .. } => {
                "relationship existence constraint"
            }
        }
    }
}

/// In-memory view of every schema rule, used to validate new ones.
#[derive(Default, Debug)]
pub struct SchemaCache {
    rules: BTreeMap<RuleId, SchemaRule>,
}

impl SchemaCache {
    /// Loads every rule from the schema store.
    pub fn load(store: &RecordStore<SchemaRecord>) -> Result<Self> {
        let mut cache = SchemaCache::default();
        for record in store.iter_in_use() {
            let rule = record.rule.clone().ok_or_else(|| {
                BatchError::corruption(format!("schema record {} has no rule", record.id))
            })?;
            if rule.id().0 != record.id {
                return Err(BatchError::corruption(format!(
                    "schema record {} holds rule {}",
                    record.id,
                    rule.id()
                )));
            }
            cache.add(rule);
        }
        Ok(cache)
    }

    /// Registers a rule.
    pub fn add(&mut self, rule: SchemaRule) {
        self.rules.insert(rule.id(), rule);
    }

    /// Every rule, by id.
    pub fn rules(&self) -> impl Iterator<Item = &SchemaRule> + '_ {
        self.rules.values()
    }

    /// Every index rule, by id.
    pub fn index_rules(&self) -> impl Iterator<Item = &IndexRule> + '_ {
        self.rules.values().filter_map(|rule| match rule {
            SchemaRule::Index(index) => Some(index),
            _ => None,
        })
    }

    /// Every constraint rule, by id.
    pub fn constraint_rules(&self) -> impl Iterator<Item = &SchemaRule> + '_ {
        self.rules.values().filter(|rule| rule.is_constraint())
    }

    /// Whether an index rule covers `descriptor`.
    pub fn has_index_rule(&self, descriptor: &LabelSchemaDescriptor) -> bool {
        self.index_rules().any(|rule| &rule.descriptor == descriptor)
    }

    /// Whether a uniqueness constraint covers `descriptor`.
    pub fn has_uniqueness_constraint(&self, descriptor: &LabelSchemaDescriptor) -> bool {
        self.rules.values().any(|rule| {
            matches!(rule, SchemaRule::UniquenessConstraint { descriptor: d, .. } if d == descriptor)
        })
    }

    /// Whether a node existence constraint covers `descriptor`.
    pub fn has_node_existence_constraint(&self, descriptor: &LabelSchemaDescriptor) -> bool {
        self.rules.values().any(|rule| {
            matches!(rule, SchemaRule::NodeExistenceConstraint { descriptor: d, .. } if d == descriptor)
        })
    }

    /// Whether a relationship existence constraint covers `descriptor`.
    pub fn has_relationship_existence_constraint(
        &self,
        descriptor: &RelTypeSchemaDescriptor,
    ) -> bool {
        self.rules.values().any(|rule| {
            matches!(rule, SchemaRule::RelationshipExistenceConstraint { descriptor: d, .. } if d == descriptor)
        })
    }

    /// Constraint owning the index rule `index`, if any.
    pub fn constraint_for_index(&self, index: RuleId) -> Option<&SchemaRule> {
        self.rules.values().find(|rule| {
            matches!(rule, SchemaRule::UniquenessConstraint { owned_index, .. } if *owned_index == index)
        })
    }

    /// Fails when an index on `descriptor` would collide with an existing rule.
    pub fn validate_index_creation(&self, descriptor: &LabelSchemaDescriptor) -> Result<()> {
        self.verify_index_or_uniqueness(descriptor, INDEX_EXISTS)
    }

    /// Fails when a uniqueness constraint on `descriptor` would collide.
    pub fn validate_uniqueness_creation(&self, descriptor: &LabelSchemaDescriptor) -> Result<()> {
        self.verify_index_or_uniqueness(descriptor, UNIQUE_ON_INDEXED)
    }

    /// Fails when an equal node existence constraint exists.
    pub fn validate_node_existence(&self, descriptor: &LabelSchemaDescriptor) -> Result<()> {
        if self.has_node_existence_constraint(descriptor) {
            return Err(BatchError::SchemaConflict(NODE_EXISTENCE_EXISTS.into()));
        }
        Ok(())
    }

    /// Fails when an equal relationship existence constraint exists.
    pub fn validate_relationship_existence(
        &self,
        descriptor: &RelTypeSchemaDescriptor,
    ) -> Result<()> {
        if self.has_relationship_existence_constraint(descriptor) {
            return Err(BatchError::SchemaConflict(REL_EXISTENCE_EXISTS.into()));
        }
        Ok(())
    }

    fn verify_index_or_uniqueness(
        &self,
        descriptor: &LabelSchemaDescriptor,
        message: &str,
    ) -> Result<()> {
        if self.has_index_rule(descriptor) || self.has_uniqueness_constraint(descriptor) {
            return Err(BatchError::SchemaConflict(message.into()));
        }
        Ok(())
    }
}

/// Schema cache plus the staged and durable schema records it writes to.
pub struct SchemaWriter<'a> {
    /// Cache validated against and updated.
    pub cache: &'a mut SchemaCache,
    /// Staged schema records.
    pub changes: &'a mut RecordChanges<SchemaRecord>,
    /// Schema store, for id allocation.
    pub store: &'a mut RecordStore<SchemaRecord>,
}

impl SchemaWriter<'_> {
    /// Validates and stages an index rule.
    pub fn create_index(
        &mut self,
        descriptor: LabelSchemaDescriptor,
        provider: ProviderDescriptor,
    ) -> Result<RuleId> {
        self.cache.validate_index_creation(&descriptor)?;
        let id = RuleId(self.store.next_id()?);
        self.stage(SchemaRule::Index(IndexRule {
            id,
            descriptor,
            provider,
            owning_constraint: None,
            unique: false,
        }))?;
        Ok(id)
    }

    /// Validates and stages a uniqueness constraint with its backing index.
    ///
    /// Returns the constraint rule id.
    pub fn create_uniqueness_constraint(
        &mut self,
        descriptor: LabelSchemaDescriptor,
        provider: ProviderDescriptor,
    ) -> Result<RuleId> {
        self.cache.validate_uniqueness_creation(&descriptor)?;
        let index_id = RuleId(self.store.next_id()?);
        let constraint_id = RuleId(self.store.next_id()?);
        self.stage(SchemaRule::Index(IndexRule {
            id: index_id,
            descriptor: descriptor.clone(),
            provider,
            owning_constraint: Some(constraint_id),
            unique: true,
        }))?;
        self.stage(SchemaRule::UniquenessConstraint {
            id: constraint_id,
            descriptor,
            owned_index: index_id,
        })?;
        Ok(constraint_id)
    }

    /// Validates and stages a node existence constraint.
    pub fn create_node_existence_constraint(
        &mut self,
        descriptor: LabelSchemaDescriptor,
    ) -> Result<RuleId> {
        self.cache.validate_node_existence(&descriptor)?;
        let id = RuleId(self.store.next_id()?);
        self.stage(SchemaRule::NodeExistenceConstraint { id, descriptor })?;
        Ok(id)
    }

    /// Validates and stages a relationship existence constraint.
    pub fn create_relationship_existence_constraint(
        &mut self,
        descriptor: RelTypeSchemaDescriptor,
    ) -> Result<RuleId> {
        self.cache.validate_relationship_existence(&descriptor)?;
        let id = RuleId(self.store.next_id()?);
        self.stage(SchemaRule::RelationshipExistenceConstraint { id, descriptor })?;
        Ok(id)
    }

    fn stage(&mut self, rule: SchemaRule) -> Result<()> {
        let id = rule.id();
        let record = self.changes.create(id.0, self.store)?;
        record.rule = Some(rule.clone());
        debug!(rule = id.0, kind = rule.kind(), "schema.rule.create");
        self.cache.add(rule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        cache: SchemaCache,
        changes: RecordChanges<SchemaRecord>,
        store: RecordStore<SchemaRecord>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                cache: SchemaCache::default(),
                changes: RecordChanges::default(),
                store: RecordStore::new("schema.db", 1_000),
            }
        }

        fn writer(&mut self) -> SchemaWriter<'_> {
            SchemaWriter {
                cache: &mut self.cache,
                changes: &mut self.changes,
                store: &mut self.store,
            }
        }
    }

    fn person_name() -> LabelSchemaDescriptor {
        LabelSchemaDescriptor::new(LabelId(0), vec![PropertyKeyId(0)])
    }

    #[test]
    fn duplicate_index_conflicts() -> Result<()> {
        let mut h = Harness::new();
        h.writer().create_index(person_name(), ProviderDescriptor::default())?;
        let err = h
            .writer()
            .create_index(person_name(), ProviderDescriptor::default())
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "schema conflict: index for given {label;property} already exists"
        );
        Ok(())
    }

    #[test]
    fn uniqueness_and_index_exclude_each_other() -> Result<()> {
        let mut h = Harness::new();
        h.writer().create_index(person_name(), ProviderDescriptor::default())?;
        assert!(matches!(
            h.writer()
                .create_uniqueness_constraint(person_name(), ProviderDescriptor::default()),
            Err(BatchError::SchemaConflict(_))
        ));

        let mut h = Harness::new();
        h.writer()
            .create_uniqueness_constraint(person_name(), ProviderDescriptor::default())?;
        assert!(matches!(
            h.writer().create_index(person_name(), ProviderDescriptor::default()),
            Err(BatchError::SchemaConflict(_))
        ));
        Ok(())
    }

    #[test]
    fn uniqueness_constraint_owns_a_unique_index() -> Result<()> {
        let mut h = Harness::new();
        let constraint = h
            .writer()
            .create_uniqueness_constraint(person_name(), ProviderDescriptor::default())?;
        let index = h
            .cache
            .index_rules()
            .next()
            .cloned()
            .ok_or_else(|| BatchError::Invalid("no index".into()))?;
        assert!(index.unique);
        assert_eq!(index.owning_constraint, Some(constraint));
        assert_eq!(
            h.cache.constraint_for_index(index.id).map(SchemaRule::id),
            Some(constraint)
        );
        assert_eq!(h.changes.changes_count(), 2);
        assert_eq!(h.changes.commit(&mut h.store)?, 2);
        assert_eq!(SchemaCache::load(&h.store)?.rules().count(), 2);
        Ok(())
    }

    #[test]
    fn existence_constraints_are_unique_per_descriptor() -> Result<()> {
        let mut h = Harness::new();
        h.writer().create_node_existence_constraint(person_name())?;
        assert!(h.writer().create_node_existence_constraint(person_name()).is_err());
        h.writer().create_index(person_name(), ProviderDescriptor::default())?;

        let since = RelTypeSchemaDescriptor {
            rel_type: TypeId(0),
            property_key: PropertyKeyId(1),
        };
        h.writer()
            .create_relationship_existence_constraint(since.clone())?;
        assert!(matches!(
            h.writer().create_relationship_existence_constraint(since),
            Err(BatchError::SchemaConflict(_))
        ));
        assert_eq!(h.cache.constraint_rules().count(), 2);
        Ok(())
    }
}
