//! Clinic ETL - customer ingestion and regional partitioning

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clinic_common::logging::{init_logging, LogConfig, LogLevel};
use clinic_etl::{EtlConfig, EtlPipeline, RecencyComparison, Stage};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "clinic-etl")]
#[command(author, version, about = "Customer record ETL with regional partitioning")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Input file (overrides CLINIC_ETL_INPUT)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// SQLite store path, or :memory: for a dry run (overrides CLINIC_ETL_STORE)
    #[arg(short, long, global = true)]
    store: Option<String>,

    /// Logical database name (overrides CLINIC_ETL_DATABASE)
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Reference date for age and recency, YYYY-MM-DD (defaults to today)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    /// Consultation date comparison: lexical or chronological
    #[arg(long, global = true)]
    recency: Option<RecencyComparison>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run extract, staging and partition in order
    Run,
    /// Load the input file into the raw collection
    Extract,
    /// Validate raw records into the staging collection
    Stage,
    /// Partition staging records by region
    Partition,
}

impl Command {
    fn stages(self) -> &'static [Stage] {
        match self {
            Command::Run => &Stage::ALL,
            Command::Extract => &[Stage::Extract],
            Command::Stage => &[Stage::Staging],
            Command::Partition => &[Stage::Partition],
        }
    }
}

impl Cli {
    fn apply(&self, mut config: EtlConfig) -> EtlConfig {
        if let Some(ref input) = self.input {
            config = config.with_input_path(input);
        }
        if let Some(ref store) = self.store {
            config = config.with_store_url(store);
        }
        if let Some(ref database) = self.database {
            config = config.with_database_name(database);
        }
        if let Some(recency) = self.recency {
            config = config.with_recency_comparison(recency);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut log_config = LogConfig::from_env().context("Invalid logging configuration")?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }

    let _guard = init_logging(&log_config)?;

    // Flags may repair env values, so validate only after applying them
    let config = cli.apply(EtlConfig::from_env().context("Failed to load configuration")?);
    config.validate().context("Invalid configuration")?;

    let pipeline = EtlPipeline::new(config);
    let store = pipeline
        .open_store()
        .with_context(|| format!("Failed to open store '{}'", pipeline.config().store_url))?;

    let today = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let summary = pipeline
        .run_stages(store.as_ref(), cli.command.stages(), today)
        .await;

    // Logs go to stderr or files; stdout carries only the summary
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.summary());
    }

    if !summary.is_success() {
        warn!("One or more stages failed, see the run summary");
    }

    Ok(())
}
