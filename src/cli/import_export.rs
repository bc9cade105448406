use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::primitives::lock::StoreLocker;
use crate::storage::catalog::{TokenKind, TokenTable};
use crate::storage::counts::CountsStore;
use crate::storage::index::{IndexDescriptor, IndexProvider, NativeIndexProvider};
use crate::storage::schema::{LabelSchemaDescriptor, SchemaCache, SchemaRule};
use crate::storage::stores::Stores;
use crate::storage::{BatchInserter, InserterOptions, PropValue};
use crate::types::{BatchError, LabelId, NodeId, TypeId};

/// A `Label:key[,key]` schema target given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTarget {
    /// Label name.
    pub label: String,
    /// Property key names.
    pub keys: Vec<String>,
}

impl FromStr for SchemaTarget {
    type Err = CliError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (label, keys) = raw
            .split_once(':')
            .ok_or_else(|| CliError::Message(format!("expected Label:key[,key], got '{raw}'")))?;
        let keys: Vec<String> = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
            .collect();
        let label = label.trim();
        if label.is_empty() || keys.is_empty() {
            return Err(CliError::Message(format!(
                "expected Label:key[,key], got '{raw}'"
            )));
        }
        Ok(SchemaTarget {
            label: label.to_owned(),
            keys,
        })
    }
}

/// Configuration for a CSV import into a store directory.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Store directory, created when missing.
    pub store_dir: PathBuf,
    /// Node CSV: `id`, optional pipe-separated `labels`, property columns.
    pub nodes: PathBuf,
    /// Relationship CSV: `src`, `dst`, `type`, property columns.
    pub relationships: Option<PathBuf>,
    /// Deferred indexes to create before loading.
    pub indexes: Vec<SchemaTarget>,
    /// Uniqueness constraints to create before loading.
    pub unique: Vec<SchemaTarget>,
    /// Inserter options.
    pub options: InserterOptions,
}

/// Summary of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Nodes created.
    pub nodes_imported: u64,
    /// Relationships created.
    pub relationships_imported: u64,
    /// Schema rules created.
    pub schema_rules: u64,
}

/// A token with its usage count.
#[derive(Debug, Clone, Serialize)]
pub struct TokenCount {
    /// Token name.
    pub name: String,
    /// Nodes carrying the label, or relationships of the type.
    pub count: u64,
}

/// Contents summary of a closed store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// In-use nodes.
    pub nodes: u64,
    /// In-use relationships.
    pub relationships: u64,
    /// Labels with node counts.
    pub labels: Vec<TokenCount>,
    /// Relationship types with relationship counts.
    pub relationship_types: Vec<TokenCount>,
    /// Property key names.
    pub property_keys: Vec<String>,
    /// Rendered schema rules.
    pub schema_rules: Vec<String>,
}

/// Error type for CLI operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Inserter or store error.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Loads the CSV files of `cfg` through a batch inserter and closes it.
///
/// Schema rules are created first so they are populated at close. The
/// session is shut down even when a row fails; the row error is returned.
pub fn run_import(cfg: &ImportConfig) -> Result<ImportSummary, CliError> {
    let mut inserter = BatchInserter::open_with(&cfg.store_dir, cfg.options.clone())?;
    let loaded = load(&mut inserter, cfg);
    let closed = inserter.shutdown().map_err(CliError::from);
    let summary = loaded?;
    closed?;
    info!(
        nodes = summary.nodes_imported,
        relationships = summary.relationships_imported,
        "import.done"
    );
    Ok(summary)
}

fn load(inserter: &mut BatchInserter, cfg: &ImportConfig) -> Result<ImportSummary, CliError> {
    let mut summary = ImportSummary::default();
    for target in &cfg.indexes {
        let mut creator = inserter.create_deferred_schema_index(&target.label);
        for key in &target.keys {
            creator = creator.on(key);
        }
        creator.create()?;
        summary.schema_rules += 1;
    }
    for target in &cfg.unique {
        if target.keys.len() != 1 {
            return Err(CliError::Message(format!(
                "uniqueness constraint on '{}' takes exactly one key",
                target.label
            )));
        }
        inserter
            .create_deferred_constraint(&target.label)
            .assert_property_is_unique(&target.keys[0])
            .create()?;
        summary.schema_rules += 1;
    }

    let mut id_map: HashMap<String, NodeId> = HashMap::new();
    summary.nodes_imported = import_nodes(inserter, &cfg.nodes, &mut id_map)?;
    if let Some(path) = &cfg.relationships {
        summary.relationships_imported = import_relationships(inserter, path, &id_map)?;
    }
    Ok(summary)
}

struct ColumnSpec {
    name: String,
    index: usize,
}

fn import_nodes(
    inserter: &mut BatchInserter,
    path: &Path,
    id_map: &mut HashMap<String, NodeId>,
) -> Result<u64, CliError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_index = find_column(&headers, "id")?;
    let label_index = headers.iter().position(|h| h.eq_ignore_ascii_case("labels"));

    let mut skip = vec![id_index];
    skip.extend(label_index);
    let columns = prop_columns(&headers, &skip);

    let mut imported = 0u64;
    for result in reader.records() {
        let record = result?;
        let ext_id = get_required(&record, id_index, "id")?;
        if id_map.contains_key(ext_id) {
            return Err(CliError::Message(format!(
                "duplicate node id '{ext_id}' in nodes file"
            )));
        }
        let labels = label_index
            .and_then(|idx| record.get(idx))
            .map(parse_labels)
            .unwrap_or_default();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let props = build_props(&record, &columns);
        let prop_refs: Vec<(&str, PropValue)> = props
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        let node = inserter.create_node(&prop_refs, &label_refs)?;
        id_map.insert(ext_id.to_owned(), node);
        imported += 1;
    }
    Ok(imported)
}

fn import_relationships(
    inserter: &mut BatchInserter,
    path: &Path,
    id_map: &HashMap<String, NodeId>,
) -> Result<u64, CliError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let src_index = find_column(&headers, "src")?;
    let dst_index = find_column(&headers, "dst")?;
    let type_index = find_column(&headers, "type")?;
    let columns = prop_columns(&headers, &[src_index, dst_index, type_index]);

    let mut imported = 0u64;
    for result in reader.records() {
        let record = result?;
        let src = resolve_node(id_map, get_required(&record, src_index, "src")?)?;
        let dst = resolve_node(id_map, get_required(&record, dst_index, "dst")?)?;
        let rel_type = get_required(&record, type_index, "type")?;
        let props = build_props(&record, &columns);
        let prop_refs: Vec<(&str, PropValue)> = props
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        inserter.create_relationship(src, dst, rel_type, &prop_refs)?;
        imported += 1;
    }
    Ok(imported)
}

fn resolve_node(id_map: &HashMap<String, NodeId>, ext_id: &str) -> Result<NodeId, CliError> {
    id_map
        .get(ext_id)
        .copied()
        .ok_or_else(|| CliError::Message(format!("relationship references unknown node id '{ext_id}'")))
}

fn prop_columns(headers: &StringRecord, skip: &[usize]) -> Vec<ColumnSpec> {
    headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| !skip.contains(idx))
        .map(|(index, name)| ColumnSpec {
            name: name.to_string(),
            index,
        })
        .collect()
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::Message(format!("column '{name}' not found")))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, CliError> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Message(format!("missing value for column '{name}'")))
}

fn parse_labels(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn build_props(record: &StringRecord, columns: &[ColumnSpec]) -> Vec<(String, PropValue)> {
    let mut props = Vec::with_capacity(columns.len());
    for col in columns {
        if let Some(value) = record.get(col.index).and_then(parse_value) {
            props.push((col.name.clone(), value));
        }
    }
    props
}

/// Empty cells and `null` mean "no property".
fn parse_value(raw: &str) -> Option<PropValue> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Some(PropValue::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(PropValue::Bool(false));
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(PropValue::Int(v));
    }
    if let Ok(v) = raw.parse::<f64>() {
        if v.is_finite() {
            return Some(PropValue::Float(v));
        }
    }
    Some(PropValue::Str(raw.to_owned()))
}

/// Summarises a closed store: counts, tokens and schema rules.
pub fn store_stats(store_dir: &Path) -> Result<StoreStats, CliError> {
    if !store_dir.is_dir() {
        return Err(CliError::Message(format!(
            "store {} does not exist",
            store_dir.display()
        )));
    }
    let mut locker = StoreLocker::acquire(store_dir)?;
    let stores = Stores::open(store_dir, &InserterOptions::default())?;
    let tokens = TokenTable::open(&stores.tokens)?;
    let schema = SchemaCache::load(&stores.schema)?;
    let counts = CountsStore::open(store_dir)?;
    let provider = NativeIndexProvider::new(store_dir);

    let stats = StoreStats {
        nodes: counts.node_count(None),
        relationships: counts.relationship_count(None),
        labels: tokens
            .tokens(TokenKind::Label)
            .into_iter()
            .map(|t| TokenCount {
                count: counts.node_count(Some(LabelId(t.id))),
                name: t.name,
            })
            .collect(),
        relationship_types: tokens
            .tokens(TokenKind::RelationshipType)
            .into_iter()
            .map(|t| TokenCount {
                count: counts.relationship_count(Some(TypeId(t.id))),
                name: t.name,
            })
            .collect(),
        property_keys: tokens
            .tokens(TokenKind::PropertyKey)
            .into_iter()
            .map(|t| t.name)
            .collect(),
        schema_rules: schema
            .rules()
            .map(|rule| describe_rule(rule, &tokens, &provider))
            .collect::<Result<_, _>>()?,
    };
    locker.release()?;
    Ok(stats)
}

fn describe_rule(
    rule: &SchemaRule,
    tokens: &TokenTable,
    provider: &NativeIndexProvider,
) -> Result<String, CliError> {
    Ok(match rule {
        SchemaRule::Index(index) => {
            let state = provider.initial_state(index.id, &IndexDescriptor::from_rule(index))?;
            let entries = provider
                .reader(index.id)
                .map(|reader| reader.entry_count())
                .unwrap_or(0);
            format!(
                "{} ON {} {:?} ({} entries)",
                rule.kind().to_uppercase(),
                label_pattern(&index.descriptor, tokens)?,
                state,
                entries
            )
        }
        SchemaRule::UniquenessConstraint { descriptor, .. }
        | SchemaRule::NodeExistenceConstraint { descriptor, .. } => format!(
            "{} ON {}",
            rule.kind().to_uppercase(),
            label_pattern(descriptor, tokens)?
        ),
        SchemaRule::RelationshipExistenceConstraint { descriptor, .. } => format!(
            "{} ON -[:{}]-({})",
            rule.kind().to_uppercase(),
            tokens.name_of(TokenKind::RelationshipType, descriptor.rel_type.0)?,
            tokens.name_of(TokenKind::PropertyKey, descriptor.property_key.0)?
        ),
    })
}

fn label_pattern(descriptor: &LabelSchemaDescriptor, tokens: &TokenTable) -> Result<String, CliError> {
    let label = tokens.name_of(TokenKind::Label, descriptor.label.0)?;
    let keys = descriptor
        .property_keys
        .iter()
        .map(|key| tokens.name_of(TokenKind::PropertyKey, key.0).map(str::to_owned))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(":{}({})", label, keys.join(", ")))
}

/// Reads inserter options from a TOML file.
pub fn load_options(path: &Path) -> Result<InserterOptions, CliError> {
    let raw = fs::read_to_string(path)?;
    Ok(InserterOptions::from_toml_str(&raw)?)
}
