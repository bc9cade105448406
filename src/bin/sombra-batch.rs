//! Binary entry point for the bulk-loading CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sombra_batch::cli::{
    load_options, run_import, store_stats, ImportConfig, ImportSummary, SchemaTarget, StoreStats,
};
use sombra_batch::storage::InserterOptions;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "sombra-batch",
    version,
    about = "Bulk-load CSV graph data into a record store directory",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load node and relationship CSV files into a store
    Import(ImportCmd),
    /// Summarise the contents of a closed store
    Stats {
        #[arg(value_name = "STORE")]
        store: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(value_name = "STORE")]
    store: PathBuf,

    #[arg(long, value_name = "FILE", help = "CSV file containing nodes (id, labels, ...)")]
    nodes: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "CSV file containing relationships (src, dst, type, ...)"
    )]
    relationships: Option<PathBuf>,

    #[arg(
        long = "index",
        value_name = "LABEL:KEYS",
        help = "Create a deferred index, e.g. Person:name (repeatable)"
    )]
    indexes: Vec<SchemaTarget>,

    #[arg(
        long,
        value_name = "LABEL:KEY",
        help = "Create a uniqueness constraint, e.g. Person:email (repeatable)"
    )]
    unique: Vec<SchemaTarget>,

    #[arg(long, value_name = "UNITS", help = "Staged changes per flush")]
    batch_size: Option<usize>,

    #[arg(
        long,
        value_name = "FILE",
        env = "SOMBRA_BATCH_CONFIG",
        help = "TOML file with inserter options"
    )]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    install_tracing_subscriber();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Import(cmd) => {
            let mut options = match &cmd.config {
                Some(path) => load_options(path)?,
                None => InserterOptions::default(),
            };
            if let Some(units) = cmd.batch_size {
                options = options.batch_size(units);
            }
            let summary = run_import(&ImportConfig {
                store_dir: cmd.store,
                nodes: cmd.nodes,
                relationships: cmd.relationships,
                indexes: cmd.indexes,
                unique: cmd.unique,
                options,
            })?;
            emit(&cli.format, &summary, || print_import_text(&summary))?;
        }
        Command::Stats { store } => {
            let stats = store_stats(&store)?;
            emit(&cli.format, &stats, || print_stats_text(&stats))?;
        }
    }
    Ok(())
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_import_text(summary: &ImportSummary) {
    println!(
        "Imported {} nodes and {} relationships ({} schema rules)",
        summary.nodes_imported, summary.relationships_imported, summary.schema_rules
    );
}

fn print_stats_text(stats: &StoreStats) {
    println!("nodes={} relationships={}", stats.nodes, stats.relationships);
    if !stats.labels.is_empty() {
        println!("Labels:");
        for label in &stats.labels {
            println!("  {}: {}", label.name, label.count);
        }
    }
    if !stats.relationship_types.is_empty() {
        println!("Relationship types:");
        for rel_type in &stats.relationship_types {
            println!("  {}: {}", rel_type.name, rel_type.count);
        }
    }
    if !stats.property_keys.is_empty() {
        println!("Property keys: {}", stats.property_keys.join(", "));
    }
    if !stats.schema_rules.is_empty() {
        println!("Schema:");
        for rule in &stats.schema_rules {
            println!("  {rule}");
        }
    }
}
