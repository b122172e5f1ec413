//! Clinic ETL Library
//!
//! Loads a pipe-delimited customer file into a document store and partitions the
//! customers into one collection per region.
//!
//! # Stages
//!
//! - **Extract**: raw rows into the `Customers` collection ([`extract`])
//! - **Staging**: validated, renamed records into `Staging_data` ([`staging`])
//! - **Partition**: recency-gated upsert into `Table_<County>` ([`partition`])
//!
//! # Example
//!
//! ```no_run
//! use clinic_etl::{EtlConfig, EtlPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EtlConfig::from_env()?;
//!     config.validate()?;
//!     let pipeline = EtlPipeline::new(config);
//!     let store = pipeline.open_store()?;
//!     let summary = pipeline.run(store.as_ref()).await;
//!     println!("{}", summary.summary());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dates;
pub mod extract;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod staging;
pub mod store;

pub use config::EtlConfig;
pub use extract::{ExtractReport, RawRecordExtractor};
pub use models::{Document, PartitionedRecord, RawRecord, StagingRecord};
pub use partition::{
    PartitionReport, PartitionSettings, RecencyComparison, RecordOutcome, RecordResult,
    RegionPartitioner,
};
pub use pipeline::{EtlPipeline, RunSummary, Stage, StageStatus};
pub use staging::{StagingReport, StagingTransformer};
pub use store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
