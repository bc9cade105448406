#![forbid(unsafe_code)]

//! Command-line helpers: CSV import through the batch inserter and store
//! summaries.

/// CSV import and store statistics.
///
/// Loads node and relationship CSV files into a store directory and reports
/// what a closed store contains.
pub mod import_export;

pub use import_export::{
    load_options, run_import, store_stats, CliError, ImportConfig, ImportSummary, SchemaTarget,
    StoreStats, TokenCount,
};
