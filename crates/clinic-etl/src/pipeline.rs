//! Pipeline orchestration
//!
//! Runs extraction, staging and partitioning in order against one store handle.
//! A failed stage is recorded in the [`RunSummary`] and the next stage still runs
//! over whatever its input collection holds.

use chrono::NaiveDate;
use clinic_common::Result;
use serde::Serialize;
use std::fmt;
use tracing::{error, info};

use crate::config::EtlConfig;
use crate::extract::{ExtractReport, RawRecordExtractor};
use crate::partition::{PartitionReport, RegionPartitioner};
use crate::staging::{StagingReport, StagingTransformer};
use crate::store::{self, DocumentStore};

/// One pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Staging,
    Partition,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Staging, Stage::Partition];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Staging => "staging",
            Stage::Partition => "partition",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single stage within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum StageStatus<T> {
    Completed(T),
    Failed(String),
    NotRun,
}

impl<T> StageStatus<T> {
    fn from_result(stage: Stage, result: Result<T>) -> Self {
        match result {
            Ok(report) => StageStatus::Completed(report),
            Err(e) => {
                error!(stage = %stage, error = %e, "Stage failed");
                StageStatus::Failed(e.to_string())
            },
        }
    }

    pub fn report(&self) -> Option<&T> {
        match self {
            StageStatus::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }
}

/// Everything one pipeline invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub as_of: NaiveDate,
    pub extract: StageStatus<ExtractReport>,
    pub staging: StageStatus<StagingReport>,
    pub partition: StageStatus<PartitionReport>,
}

impl RunSummary {
    fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            extract: StageStatus::NotRun,
            staging: StageStatus::NotRun,
            partition: StageStatus::NotRun,
        }
    }

    /// No stage failed; per-record skips and failures do not count
    pub fn is_success(&self) -> bool {
        !(self.extract.is_failed() || self.staging.is_failed() || self.partition.is_failed())
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Run as of {}", self.as_of)];

        lines.push(match &self.extract {
            StageStatus::Completed(r) => format!(
                "  extract:   {} data lines, {} raw records inserted",
                r.data_lines, r.inserted
            ),
            other => format!("  extract:   {}", status_label(other)),
        });

        lines.push(match &self.staging {
            StageStatus::Completed(r) => format!(
                "  staging:   {} scanned, {} loaded, {} failed validation",
                r.scanned, r.loaded, r.skipped_validation
            ),
            other => format!("  staging:   {}", status_label(other)),
        });

        match &self.partition {
            StageStatus::Completed(r) => {
                lines.push(format!(
                    "  partition: {} scanned, {} inserted, {} updated, {} unchanged, {} stale",
                    r.scanned, r.inserted, r.updated, r.no_update_needed, r.skipped_stale
                ));
                lines.push(format!(
                    "             skipped: {} no county, {} unparseable, {} invalid partition; {} failed",
                    r.skipped_no_county,
                    r.skipped_parse_error,
                    r.skipped_invalid_partition,
                    r.failed
                ));
                if !r.partitions_created.is_empty() {
                    lines.push(format!(
                        "             new partitions: {}",
                        r.partitions_created.join(", ")
                    ));
                }
            },
            other => lines.push(format!("  partition: {}", status_label(other))),
        }

        lines.join("\n")
    }
}

fn status_label<T>(status: &StageStatus<T>) -> String {
    match status {
        StageStatus::Completed(_) => "completed".to_string(),
        StageStatus::Failed(reason) => format!("FAILED ({})", reason),
        StageStatus::NotRun => "not run".to_string(),
    }
}

/// Three-stage customer ETL over a single document store
pub struct EtlPipeline {
    config: EtlConfig,
    extractor: RawRecordExtractor,
    transformer: StagingTransformer,
    partitioner: RegionPartitioner,
}

impl EtlPipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self {
            extractor: RawRecordExtractor::with_delimiter(config.delimiter),
            transformer: StagingTransformer::new(),
            partitioner: RegionPartitioner::new(config.partition.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Open the store the configuration points at
    pub fn open_store(&self) -> Result<Box<dyn DocumentStore>> {
        store::open_store(&self.config)
    }

    pub async fn extract(&self, store: &dyn DocumentStore) -> Result<ExtractReport> {
        self.extractor
            .extract(&self.config.input_path, store, &self.config.raw_collection)
            .await
    }

    pub async fn stage(&self, store: &dyn DocumentStore) -> Result<StagingReport> {
        self.transformer
            .run(
                store,
                &self.config.raw_collection,
                &self.config.staging_collection,
            )
            .await
    }

    pub async fn partition(
        &self,
        store: &dyn DocumentStore,
        today: NaiveDate,
    ) -> Result<PartitionReport> {
        self.partitioner
            .run_as_of(store, &self.config.staging_collection, today)
            .await
    }

    /// Run all three stages as of the local calendar date
    pub async fn run(&self, store: &dyn DocumentStore) -> RunSummary {
        let today = chrono::Local::now().date_naive();
        self.run_as_of(store, today).await
    }

    pub async fn run_as_of(&self, store: &dyn DocumentStore, today: NaiveDate) -> RunSummary {
        self.run_stages(store, &Stage::ALL, today).await
    }

    /// Run the selected stages, always in pipeline order
    pub async fn run_stages(
        &self,
        store: &dyn DocumentStore,
        stages: &[Stage],
        today: NaiveDate,
    ) -> RunSummary {
        info!(
            backend = store.backend(),
            database = %self.config.database_name,
            input = %self.config.input_path.display(),
            stages = ?stages,
            "Starting ETL run"
        );

        let mut summary = RunSummary::new(today);

        if stages.contains(&Stage::Extract) {
            summary.extract = StageStatus::from_result(Stage::Extract, self.extract(store).await);
        }
        if stages.contains(&Stage::Staging) {
            summary.staging = StageStatus::from_result(Stage::Staging, self.stage(store).await);
        }
        if stages.contains(&Stage::Partition) {
            summary.partition =
                StageStatus::from_result(Stage::Partition, self.partition(store, today).await);
        }

        info!(success = summary.is_success(), "ETL run finished");
        summary
    }
}
