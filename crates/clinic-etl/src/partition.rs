//! Region partitioning
//!
//! Reads every staging record, derives `age` and `days_since_last_consult`, and
//! merges the records that pass the recency gate into one collection per County.
//!
//! # Merge rules
//! - no record with the same `Cust_I` in the partition: insert
//! - existing record with an older `Consul_Dt`: overwrite its fields in place
//! - otherwise: leave it alone
//!
//! Every record gets a [`RecordOutcome`]; a bad record never stops the batch.

use chrono::NaiveDate;
use clinic_common::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::dates;
use crate::models::{staging_fields, text_field, Document, PartitionedRecord, StagingRecord};
use crate::store::DocumentStore;

pub const DEFAULT_PARTITION_PREFIX: &str = "Table_";
pub const DEFAULT_RECENCY_DAYS: i64 = 30;

/// How an incoming `Consul_Dt` is compared against the stored one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencyComparison {
    /// Plain string ordering of the stored values
    #[default]
    Lexical,
    /// Both values parsed as `YYYYMMDD` dates; an unparseable stored value counts as older
    Chronological,
}

impl RecencyComparison {
    /// Whether `incoming` should replace `existing`
    ///
    /// A stored record without a consultation date is always older.
    pub fn is_newer(self, incoming: &str, existing: Option<&str>) -> bool {
        let Some(existing) = existing else {
            return true;
        };

        match self {
            RecencyComparison::Lexical => incoming > existing,
            RecencyComparison::Chronological => {
                let incoming = dates::parse_consult_date(Some(incoming));
                let existing = dates::parse_consult_date(Some(existing));
                match (incoming, existing) {
                    (Ok(incoming), Ok(existing)) => incoming > existing,
                    (Ok(_), Err(_)) => true,
                    (Err(_), _) => false,
                }
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecencyComparison::Lexical => "lexical",
            RecencyComparison::Chronological => "chronological",
        }
    }
}

impl fmt::Display for RecencyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecencyComparison {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "chronological" => Ok(Self::Chronological),
            other => Err(EtlError::config(format!(
                "Invalid recency comparison '{}': expected lexical or chronological",
                other
            ))),
        }
    }
}

/// Tunables for the partition stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Prepended to the County value to form the collection name
    pub prefix: String,
    /// Records consulted this many days ago or more recently are skipped
    pub recency_days: i64,
    pub comparison: RecencyComparison,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PARTITION_PREFIX.to_string(),
            recency_days: DEFAULT_RECENCY_DAYS,
            comparison: RecencyComparison::default(),
        }
    }
}

/// Collection name for a County
///
/// The County is used verbatim. Values that cannot name a collection (blank,
/// containing `$` or control characters) are rejected.
pub fn partition_name(prefix: &str, county: &str) -> Result<String> {
    if county.trim().is_empty() {
        return Err(EtlError::InvalidPartition(format!(
            "County '{}' is blank",
            county
        )));
    }
    if let Some(bad) = county.chars().find(|c| *c == '$' || c.is_control()) {
        return Err(EtlError::InvalidPartition(format!(
            "County {:?} contains forbidden character {:?}",
            county, bad
        )));
    }
    Ok(format!("{}{}", prefix, county))
}

/// What happened to one staging record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RecordOutcome {
    Inserted,
    Updated,
    NoUpdateNeeded,
    SkippedNoCounty,
    SkippedParseError(String),
    SkippedStale,
    SkippedInvalidPartition(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordResult {
    pub cust_id: Option<String>,
    pub partition: Option<String>,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

/// Aggregate result of one partitioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub no_update_needed: usize,
    pub skipped_no_county: usize,
    pub skipped_parse_error: usize,
    pub skipped_stale: usize,
    pub skipped_invalid_partition: usize,
    pub failed: usize,
    /// Partitions that did not exist before this pass
    pub partitions_created: Vec<String>,
    /// Per-record outcomes in scan order
    pub records: Vec<RecordResult>,
}

impl PartitionReport {
    pub fn record(&mut self, result: RecordResult) {
        self.scanned += 1;
        match result.outcome {
            RecordOutcome::Inserted => self.inserted += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::NoUpdateNeeded => self.no_update_needed += 1,
            RecordOutcome::SkippedNoCounty => self.skipped_no_county += 1,
            RecordOutcome::SkippedParseError(_) => self.skipped_parse_error += 1,
            RecordOutcome::SkippedStale => self.skipped_stale += 1,
            RecordOutcome::SkippedInvalidPartition(_) => self.skipped_invalid_partition += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
        self.records.push(result);
    }

    /// Store mutations performed by the pass
    pub fn writes(&self) -> usize {
        self.inserted + self.updated + self.partitions_created.len()
    }
}

/// Partitions known to exist, loaded from the store on first use
#[derive(Default)]
struct PartitionCatalog {
    known: Option<HashSet<String>>,
}

impl PartitionCatalog {
    /// Create the partition if needed; returns `true` when it was created
    async fn ensure(&mut self, store: &dyn DocumentStore, name: &str) -> Result<bool> {
        if self.known.is_none() {
            let existing = store.list_collections().await?;
            self.known = Some(existing.into_iter().collect());
        }
        let known = self.known.get_or_insert_with(HashSet::new);

        if known.contains(name) {
            return Ok(false);
        }
        store.create_collection(name).await?;
        known.insert(name.to_string());
        Ok(true)
    }
}

pub struct RegionPartitioner {
    settings: PartitionSettings,
}

impl RegionPartitioner {
    pub fn new(settings: PartitionSettings) -> Self {
        Self { settings }
    }

    /// Partition the staging collection as of the local calendar date
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
        staging_collection: &str,
    ) -> Result<PartitionReport> {
        let today = chrono::Local::now().date_naive();
        self.run_as_of(store, staging_collection, today).await
    }

    /// Partition the staging collection with `today` as the reference date
    ///
    /// Only a failure to read the staging collection is returned as an error.
    pub async fn run_as_of(
        &self,
        store: &dyn DocumentStore,
        staging_collection: &str,
        today: NaiveDate,
    ) -> Result<PartitionReport> {
        info!(
            collection = staging_collection,
            %today,
            recency_days = self.settings.recency_days,
            comparison = %self.settings.comparison,
            "Partitioning staging records"
        );

        let documents = store.find_all(staging_collection).await?;
        let mut catalog = PartitionCatalog::default();
        let mut report = PartitionReport::default();

        for document in &documents {
            let result = self
                .process(store, &mut catalog, &mut report, document, today)
                .await;
            log_outcome(&result);
            report.record(result);
        }

        info!(
            scanned = report.scanned,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.no_update_needed,
            stale = report.skipped_stale,
            skipped = report.skipped_no_county
                + report.skipped_parse_error
                + report.skipped_invalid_partition,
            failed = report.failed,
            partitions_created = report.partitions_created.len(),
            "Partitioning complete"
        );

        Ok(report)
    }

    async fn process(
        &self,
        store: &dyn DocumentStore,
        catalog: &mut PartitionCatalog,
        report: &mut PartitionReport,
        document: &Document,
        today: NaiveDate,
    ) -> RecordResult {
        let cust_id = text_field(document, staging_fields::CUST_ID);
        let mut result = RecordResult {
            cust_id,
            partition: None,
            outcome: RecordOutcome::SkippedNoCounty,
        };

        let county = match text_field(document, staging_fields::COUNTY) {
            Some(county) if !county.is_empty() => county,
            _ => return result,
        };

        let record = match self.derive(document, today) {
            Ok(record) => record,
            Err(e) => {
                result.outcome = RecordOutcome::SkippedParseError(e.to_string());
                return result;
            },
        };

        if record.days_since_last_consult <= self.settings.recency_days {
            result.outcome = RecordOutcome::SkippedStale;
            return result;
        }

        let partition = match partition_name(&self.settings.prefix, &county) {
            Ok(name) => name,
            Err(e) => {
                result.outcome = RecordOutcome::SkippedInvalidPartition(e.to_string());
                return result;
            },
        };
        result.partition = Some(partition.clone());

        match catalog.ensure(store, &partition).await {
            Ok(true) => {
                info!(partition = %partition, "Created partition");
                report.partitions_created.push(partition.clone());
            },
            Ok(false) => {},
            Err(e) => {
                result.outcome = RecordOutcome::Failed(e.to_string());
                return result;
            },
        }

        result.outcome = match self.merge(store, &partition, &record).await {
            Ok(outcome) => outcome,
            Err(e) => RecordOutcome::Failed(e.to_string()),
        };
        result
    }

    fn derive(&self, document: &Document, today: NaiveDate) -> Result<PartitionedRecord> {
        let staging = StagingRecord::from_document(document)?;
        let dob = dates::parse_dob(staging.dob.as_deref())?;
        let consulted = dates::parse_consult_date(staging.consult_date.as_deref())?;

        Ok(PartitionedRecord {
            age: dates::age_on(dob, today),
            days_since_last_consult: dates::days_since(consulted, today),
            staging,
        })
    }

    async fn merge(
        &self,
        store: &dyn DocumentStore,
        partition: &str,
        record: &PartitionedRecord,
    ) -> Result<RecordOutcome> {
        let cust_id = record.staging.cust_id.as_str();
        let document = record.to_document()?;

        let Some(existing) = store
            .find_one(partition, staging_fields::CUST_ID, cust_id)
            .await?
        else {
            store.insert_one(partition, document).await?;
            return Ok(RecordOutcome::Inserted);
        };

        let incoming = record.staging.consult_date.as_deref().unwrap_or_default();
        let current = text_field(&existing, staging_fields::CONSUL_DT);
        if !self.settings.comparison.is_newer(incoming, current.as_deref()) {
            return Ok(RecordOutcome::NoUpdateNeeded);
        }

        if store
            .update_one(partition, staging_fields::CUST_ID, cust_id, document)
            .await?
        {
            Ok(RecordOutcome::Updated)
        } else {
            Err(EtlError::store(format!(
                "Record {} disappeared from {} before update",
                cust_id, partition
            )))
        }
    }
}

fn log_outcome(result: &RecordResult) {
    let cust_id = result.cust_id.as_deref().unwrap_or("<none>");
    let partition = result.partition.as_deref().unwrap_or("-");

    match &result.outcome {
        RecordOutcome::Inserted => info!(cust_id, partition, "Inserted record"),
        RecordOutcome::Updated => info!(cust_id, partition, "Updated record"),
        RecordOutcome::NoUpdateNeeded => {
            info!(cust_id, partition, "No update needed, stored consultation is as recent")
        },
        RecordOutcome::SkippedNoCounty => warn!(cust_id, "County missing, record skipped"),
        RecordOutcome::SkippedParseError(reason) => {
            warn!(cust_id, reason = %reason, "Record skipped, could not parse dates")
        },
        RecordOutcome::SkippedStale => debug!(cust_id, "Consulted too recently, record skipped"),
        RecordOutcome::SkippedInvalidPartition(reason) => {
            warn!(cust_id, reason = %reason, "Record skipped, invalid partition name")
        },
        RecordOutcome::Failed(reason) => error!(cust_id, partition, reason = %reason, "Record failed"),
    }
}
