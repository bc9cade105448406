#![forbid(unsafe_code)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::primitives::store::Record;
use crate::storage::props::{read_name, write_name};
use crate::storage::record::TokenRecord;
use crate::storage::stores::{TokenStore, TokenStores};
use crate::types::{BatchError, Result};

/// The three token namespaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Property key names.
    PropertyKey,
    /// Node labels.
    Label,
    /// Relationship types.
    RelationshipType,
}

impl TokenKind {
    /// All kinds, in store order.
    pub const ALL: [TokenKind; 3] = [
        TokenKind::PropertyKey,
        TokenKind::Label,
        TokenKind::RelationshipType,
    ];

    /// Record kind used in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::PropertyKey => "property key",
            TokenKind::Label => "label",
            TokenKind::RelationshipType => "relationship type",
        }
    }

    fn slot(self) -> usize {
        match self {
            TokenKind::PropertyKey => 0,
            TokenKind::Label => 1,
            TokenKind::RelationshipType => 2,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Token id.
    pub id: u32,
    /// Token name.
    pub name: String,
}

/// Lookup and creation counters of a token table.
#[derive(Default)]
pub struct TokenMetrics {
    lookup_calls: AtomicU64,
    lookup_hits: AtomicU64,
    created: AtomicU64,
}

/// Point-in-time copy of [`TokenMetrics`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenMetricsSnapshot {
    /// Lookups by name.
    pub lookup_calls: u64,
    /// Lookups that found an existing token.
    pub lookup_hits: u64,
    /// Tokens created.
    pub created: u64,
}

impl TokenMetricsSnapshot {
    /// Share of lookups that hit, zero before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        if self.lookup_calls == 0 {
            return 0.0;
        }
        self.lookup_hits as f64 / self.lookup_calls as f64
    }
}

impl TokenMetrics {
    /// Current counter values.
    pub fn snapshot(&self) -> TokenMetricsSnapshot {
        TokenMetricsSnapshot {
            lookup_calls: self.lookup_calls.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
        }
    }

    fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct Registry {
    by_name: FxHashMap<String, u32>,
    by_id: FxHashMap<u32, String>,
}

impl Registry {
    fn insert(&mut self, kind: TokenKind, id: u32, name: String) -> Result<()> {
        if self.by_name.contains_key(&name) || self.by_id.contains_key(&id) {
            return Err(BatchError::corruption(format!(
                "duplicate {kind} token '{name}' (id {id})"
            )));
        }
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, name);
        Ok(())
    }
}

/// In-memory name↔id registries over the token stores.
///
/// Tokens are never staged: a new token's name records and token record are
/// written to the token stores as soon as it is created.
pub struct TokenTable {
    registries: [Registry; 3],
    metrics: Arc<TokenMetrics>,
}

impl TokenTable {
    /// Loads every token from the stores.
    pub fn open(stores: &TokenStores) -> Result<Self> {
        let mut table = TokenTable {
            registries: Default::default(),
            metrics: Arc::new(TokenMetrics::default()),
        };
        for kind in TokenKind::ALL {
            let store = stores.get(kind);
            for record in store.records.iter_in_use() {
                let name = read_name(&store.names, record.name_id)?;
                let id = u32::try_from(record.id).map_err(|_| {
                    BatchError::corruption(format!("{kind} token id {} out of range", record.id))
                })?;
                table.registries[kind.slot()].insert(kind, id, name)?;
            }
        }
        Ok(table)
    }

    /// Counters of this table.
    pub fn metrics_snapshot(&self) -> TokenMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Id of `name`, without creating it.
    pub fn id_of(&self, kind: TokenKind, name: &str) -> Option<u32> {
        self.metrics.inc(&self.metrics.lookup_calls);
        let found = self.registries[kind.slot()].by_name.get(name).copied();
        if found.is_some() {
            self.metrics.inc(&self.metrics.lookup_hits);
        }
        found
    }

    /// Name of token `id`.
    pub fn name_of(&self, kind: TokenKind, id: u32) -> Result<&str> {
        self.registries[kind.slot()]
            .by_id
            .get(&id)
            .map(String::as_str)
            .ok_or(BatchError::NotFound {
                kind: kind.as_str(),
                id: u64::from(id),
            })
    }

    /// Id of `name`, creating and persisting a token on first sight.
    pub fn get_or_create(
        &mut self,
        kind: TokenKind,
        name: &str,
        stores: &mut TokenStores,
    ) -> Result<u32> {
        if let Some(id) = self.id_of(kind, name) {
            trace!(%kind, name, id, "catalog.token.hit");
            return Ok(id);
        }
        let id = create_token(stores.get_mut(kind), name)?;
        self.registries[kind.slot()].insert(kind, id, name.to_owned())?;
        self.metrics.inc(&self.metrics.created);
        trace!(%kind, name, id, "catalog.token.insert");
        Ok(id)
    }

    /// Number of tokens of `kind`.
    pub fn len(&self, kind: TokenKind) -> usize {
        self.registries[kind.slot()].by_id.len()
    }

    /// Whether no token of `kind` exists.
    pub fn is_empty(&self, kind: TokenKind) -> bool {
        self.len(kind) == 0
    }

    /// Tokens of `kind` sorted by id.
    pub fn tokens(&self, kind: TokenKind) -> Vec<Token> {
        let mut out: Vec<Token> = self.registries[kind.slot()]
            .by_id
            .iter()
            .map(|(id, name)| Token {
                id: *id,
                name: name.clone(),
            })
            .collect();
        out.sort_by_key(|t| t.id);
        out
    }
}

fn create_token(store: &mut TokenStore, name: &str) -> Result<u32> {
    let raw = store.records.next_id()?;
    let id = u32::try_from(raw).map_err(|_| BatchError::IdSpaceExhausted(TokenRecord::KIND))?;
    let name_id = write_name(&mut store.names, name)?;
    store.records.update_record(TokenRecord {
        id: raw,
        in_use: true,
        name_id,
    })?;
    Ok(id)
}
