use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::types::{BatchError, Result};

use super::metrics::InserterMetrics;
use super::record::PROPERTY_RECORD_BLOCKS;

/// Parameter key for [`InserterOptions::batch_size`].
pub const PARAM_BATCH_SIZE: &str = "batch_size";
/// Parameter key for [`InserterOptions::inline_label_capacity`].
pub const PARAM_INLINE_LABEL_CAPACITY: &str = "inline_label_capacity";
/// Parameter key for [`InserterOptions::short_string_max_bytes`].
pub const PARAM_SHORT_STRING_MAX_BYTES: &str = "short_string_max_bytes";
/// Parameter key for [`InserterOptions::string_block_size`].
pub const PARAM_STRING_BLOCK_SIZE: &str = "string_block_size";
/// Parameter key for [`InserterOptions::array_block_size`].
pub const PARAM_ARRAY_BLOCK_SIZE: &str = "array_block_size";
/// Parameter key for [`InserterOptions::label_block_size`].
pub const PARAM_LABEL_BLOCK_SIZE: &str = "label_block_size";
/// Parameter key for [`InserterOptions::name_block_size`].
pub const PARAM_NAME_BLOCK_SIZE: &str = "name_block_size";
/// Parameter key for [`InserterOptions::max_node_id`].
pub const PARAM_MAX_NODE_ID: &str = "max_node_id";
/// Parameter key for [`InserterOptions::dump_configuration`].
pub const PARAM_DUMP_CONFIGURATION: &str = "dump_configuration";
/// Store upgrades are never performed by the inserter; `true` is rejected.
pub const PARAM_ALLOW_STORE_UPGRADE: &str = "allow_store_upgrade";

/// Highest node id the default record format can address.
pub const DEFAULT_MAX_NODE_ID: u64 = (1 << 35) - 1;

const MAX_SHORT_STRING_BYTES: usize = (PROPERTY_RECORD_BLOCKS - 1) * 8;

/// Configuration options supplied when opening a [`super::BatchInserter`].
#[derive(Clone)]
pub struct InserterOptions {
    /// Mutation units staged before an automatic commit.
    pub batch_size: usize,
    /// Labels kept inline in the node record before spilling to a chain.
    pub inline_label_capacity: usize,
    /// Longest string or byte string stored inline in a property block.
    pub short_string_max_bytes: usize,
    /// Payload bytes per record of the property string store.
    pub string_block_size: usize,
    /// Payload bytes per record of the property array store.
    pub array_block_size: usize,
    /// Payload bytes per record of the node label store.
    pub label_block_size: usize,
    /// Payload bytes per record of the token name stores.
    pub name_block_size: usize,
    /// Highest node id accepted, for generated and caller-chosen ids.
    pub max_node_id: u64,
    /// Whether to log the effective parameters at open.
    pub dump_configuration: bool,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn InserterMetrics>>,
}

impl Default for InserterOptions {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            inline_label_capacity: 4,
            short_string_max_bytes: 23,
            string_block_size: 120,
            array_block_size: 120,
            label_block_size: 60,
            name_block_size: 30,
            max_node_id: DEFAULT_MAX_NODE_ID,
            dump_configuration: false,
            metrics: None,
        }
    }
}

impl fmt::Debug for InserterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InserterOptions")
            .field("batch_size", &self.batch_size)
            .field("inline_label_capacity", &self.inline_label_capacity)
            .field("short_string_max_bytes", &self.short_string_max_bytes)
            .field("string_block_size", &self.string_block_size)
            .field("array_block_size", &self.array_block_size)
            .field("label_block_size", &self.label_block_size)
            .field("name_block_size", &self.name_block_size)
            .field("max_node_id", &self.max_node_id)
            .field("dump_configuration", &self.dump_configuration)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// On-disk form of the options, as read from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
    batch_size: Option<usize>,
    inline_label_capacity: Option<usize>,
    short_string_max_bytes: Option<usize>,
    string_block_size: Option<usize>,
    array_block_size: Option<usize>,
    label_block_size: Option<usize>,
    name_block_size: Option<usize>,
    max_node_id: Option<u64>,
    dump_configuration: Option<bool>,
    allow_store_upgrade: Option<bool>,
}

impl InserterOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of mutation units between automatic commits.
    pub fn batch_size(mut self, units: usize) -> Self {
        self.batch_size = units;
        self
    }

    /// Sets how many labels stay inline in a node record.
    pub fn inline_label_capacity(mut self, labels: usize) -> Self {
        self.inline_label_capacity = labels;
        self
    }

    /// Sets the inline limit for strings and byte strings.
    pub fn short_string_max_bytes(mut self, bytes: usize) -> Self {
        self.short_string_max_bytes = bytes;
        self
    }

    /// Sets the record payload size of the string store.
    pub fn string_block_size(mut self, bytes: usize) -> Self {
        self.string_block_size = bytes;
        self
    }

    /// Sets the record payload size of the array store.
    pub fn array_block_size(mut self, bytes: usize) -> Self {
        self.array_block_size = bytes;
        self
    }

    /// Sets the record payload size of the node label store.
    pub fn label_block_size(mut self, bytes: usize) -> Self {
        self.label_block_size = bytes;
        self
    }

    /// Sets the record payload size of the token name stores.
    pub fn name_block_size(mut self, bytes: usize) -> Self {
        self.name_block_size = bytes;
        self
    }

    /// Sets the highest accepted node id.
    pub fn max_node_id(mut self, id: u64) -> Self {
        self.max_node_id = id;
        self
    }

    /// Enables or disables logging the effective parameters at open.
    pub fn dump_configuration(mut self, enabled: bool) -> Self {
        self.dump_configuration = enabled;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn InserterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds options from string parameters.
    ///
    /// Unknown keys are logged and ignored; `allow_store_upgrade=true` is rejected.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self> {
        let mut opts = Self::default();
        for (key, raw) in params {
            match key.as_str() {
                PARAM_BATCH_SIZE => opts.batch_size = parse(key, raw)?,
                PARAM_INLINE_LABEL_CAPACITY => opts.inline_label_capacity = parse(key, raw)?,
                PARAM_SHORT_STRING_MAX_BYTES => opts.short_string_max_bytes = parse(key, raw)?,
                PARAM_STRING_BLOCK_SIZE => opts.string_block_size = parse(key, raw)?,
                PARAM_ARRAY_BLOCK_SIZE => opts.array_block_size = parse(key, raw)?,
                PARAM_LABEL_BLOCK_SIZE => opts.label_block_size = parse(key, raw)?,
                PARAM_NAME_BLOCK_SIZE => opts.name_block_size = parse(key, raw)?,
                PARAM_MAX_NODE_ID => opts.max_node_id = parse(key, raw)?,
                PARAM_DUMP_CONFIGURATION => opts.dump_configuration = parse(key, raw)?,
                PARAM_ALLOW_STORE_UPGRADE => {
                    if parse::<bool>(key, raw)? {
                        return Err(store_upgrade_rejected());
                    }
                }
                other => warn!(param = other, "options.param.unknown"),
            }
        }
        opts.validate()?;
        Ok(opts)
    }

    /// Builds options from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: OptionsFile =
            toml::from_str(raw).map_err(|err| BatchError::Config(err.to_string()))?;
        if file.allow_store_upgrade == Some(true) {
            return Err(store_upgrade_rejected());
        }
        let defaults = Self::default();
        let opts = Self {
            batch_size: file.batch_size.unwrap_or(defaults.batch_size),
            inline_label_capacity: file
                .inline_label_capacity
                .unwrap_or(defaults.inline_label_capacity),
            short_string_max_bytes: file
                .short_string_max_bytes
                .unwrap_or(defaults.short_string_max_bytes),
            string_block_size: file.string_block_size.unwrap_or(defaults.string_block_size),
            array_block_size: file.array_block_size.unwrap_or(defaults.array_block_size),
            label_block_size: file.label_block_size.unwrap_or(defaults.label_block_size),
            name_block_size: file.name_block_size.unwrap_or(defaults.name_block_size),
            max_node_id: file.max_node_id.unwrap_or(defaults.max_node_id),
            dump_configuration: file
                .dump_configuration
                .unwrap_or(defaults.dump_configuration),
            metrics: None,
        };
        opts.validate()?;
        Ok(opts)
    }

    /// Checks the options for values the stores cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BatchError::Config("batch_size must be positive".into()));
        }
        if self.short_string_max_bytes > MAX_SHORT_STRING_BYTES {
            return Err(BatchError::Config(format!(
                "short_string_max_bytes must be at most {MAX_SHORT_STRING_BYTES}"
            )));
        }
        for (name, size) in [
            (PARAM_STRING_BLOCK_SIZE, self.string_block_size),
            (PARAM_ARRAY_BLOCK_SIZE, self.array_block_size),
            (PARAM_LABEL_BLOCK_SIZE, self.label_block_size),
            (PARAM_NAME_BLOCK_SIZE, self.name_block_size),
        ] {
            if size == 0 {
                return Err(BatchError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Effective parameters as key/value pairs.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(PARAM_BATCH_SIZE.into(), self.batch_size.to_string());
        params.insert(
            PARAM_INLINE_LABEL_CAPACITY.into(),
            self.inline_label_capacity.to_string(),
        );
        params.insert(
            PARAM_SHORT_STRING_MAX_BYTES.into(),
            self.short_string_max_bytes.to_string(),
        );
        params.insert(
            PARAM_STRING_BLOCK_SIZE.into(),
            self.string_block_size.to_string(),
        );
        params.insert(PARAM_ARRAY_BLOCK_SIZE.into(), self.array_block_size.to_string());
        params.insert(PARAM_LABEL_BLOCK_SIZE.into(), self.label_block_size.to_string());
        params.insert(PARAM_NAME_BLOCK_SIZE.into(), self.name_block_size.to_string());
        params.insert(PARAM_MAX_NODE_ID.into(), self.max_node_id.to_string());
        params.insert(
            PARAM_DUMP_CONFIGURATION.into(),
            self.dump_configuration.to_string(),
        );
        params
    }

    pub(crate) fn dump(&self) {
        for (key, value) in self.to_params() {
            info!(%key, %value, "options.dump");
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BatchError::Config(format!("invalid value '{raw}' for {key}")))
}

fn store_upgrade_rejected() -> BatchError {
    BatchError::Config(
        "batch inserter is not allowed to upgrade a store, open it with the graph engine instead"
            .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn params_override_defaults() -> Result<()> {
        let opts = InserterOptions::from_params(&params(&[
            ("batch_size", "50"),
            ("inline_label_capacity", "2"),
            ("some_other_setting", "x"),
        ]))?;
        assert_eq!(opts.batch_size, 50);
        assert_eq!(opts.inline_label_capacity, 2);
        assert_eq!(opts.short_string_max_bytes, 23);
        Ok(())
    }

    #[test]
    fn store_upgrade_is_rejected() {
        let err = InserterOptions::from_params(&params(&[("allow_store_upgrade", "true")]))
            .unwrap_err();
        assert!(matches!(err, BatchError::Config(_)));
        assert!(InserterOptions::from_params(&params(&[("allow_store_upgrade", "false")])).is_ok());
        assert!(InserterOptions::from_toml_str("allow_store_upgrade = true").is_err());
    }

    #[test]
    fn toml_overrides_defaults() -> Result<()> {
        let opts = InserterOptions::from_toml_str("batch_size = 7\nlabel_block_size = 8\n")?;
        assert_eq!(opts.batch_size, 7);
        assert_eq!(opts.label_block_size, 8);
        assert_eq!(opts.name_block_size, 30);
        assert!(InserterOptions::from_toml_str("bogus = 1").is_err());
        Ok(())
    }

    #[test]
    fn validation_rejects_unusable_values() {
        assert!(InserterOptions::new().batch_size(0).validate().is_err());
        assert!(InserterOptions::new()
            .short_string_max_bytes(40)
            .validate()
            .is_err());
        assert!(InserterOptions::new().string_block_size(0).validate().is_err());
        assert!(InserterOptions::new().validate().is_ok());
    }

    #[test]
    fn params_round_trip_through_to_params() -> Result<()> {
        let opts = InserterOptions::new().batch_size(3).max_node_id(99);
        let again = InserterOptions::from_params(&opts.to_params())?;
        assert_eq!(again.batch_size, 3);
        assert_eq!(again.max_node_id, 99);
        Ok(())
    }
}
