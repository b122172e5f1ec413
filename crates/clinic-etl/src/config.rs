//! Pipeline configuration

use anyhow::Context;
use std::path::PathBuf;

use crate::extract::DEFAULT_DELIMITER;
use crate::partition::{PartitionSettings, RecencyComparison};

// ============================================================================
// Defaults
// ============================================================================

/// Default input file location.
pub const DEFAULT_INPUT_PATH: &str = "./data/customers.txt";

/// Default SQLite store file.
pub const DEFAULT_STORE_URL: &str = "./data/clinic.db";

/// Store URL selecting the in-process store.
pub const MEMORY_STORE_URL: &str = ":memory:";

/// Default logical database name.
pub const DEFAULT_DATABASE_NAME: &str = "Hospital";

/// Default raw collection.
pub const DEFAULT_RAW_COLLECTION: &str = "Customers";

/// Default staging collection.
pub const DEFAULT_STAGING_COLLECTION: &str = "Staging_data";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    pub input_path: PathBuf,
    /// SQLite file path, or `:memory:`
    pub store_url: String,
    pub database_name: String,
    pub delimiter: char,
    pub raw_collection: String,
    pub staging_collection: String,
    pub partition: PartitionSettings,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            store_url: DEFAULT_STORE_URL.to_string(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            delimiter: DEFAULT_DELIMITER,
            raw_collection: DEFAULT_RAW_COLLECTION.to_string(),
            staging_collection: DEFAULT_STAGING_COLLECTION.to_string(),
            partition: PartitionSettings::default(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from `.env` and the process environment
    ///
    /// - `CLINIC_ETL_INPUT`, `CLINIC_ETL_STORE`, `CLINIC_ETL_DATABASE`
    /// - `CLINIC_ETL_DELIMITER`: a single character
    /// - `CLINIC_ETL_RAW_COLLECTION`, `CLINIC_ETL_STAGING_COLLECTION`
    /// - `CLINIC_ETL_PARTITION_PREFIX`, `CLINIC_ETL_RECENCY_DAYS`
    /// - `CLINIC_ETL_RECENCY_COMPARISON`: lexical or chronological
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EtlConfig::from_env`] but over an arbitrary key lookup
    ///
    /// Only malformed values are rejected here; call [`EtlConfig::validate`]
    /// once any overrides have been applied.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(input) = lookup("CLINIC_ETL_INPUT") {
            config.input_path = PathBuf::from(input);
        }
        if let Some(store) = lookup("CLINIC_ETL_STORE") {
            config.store_url = store;
        }
        if let Some(database) = lookup("CLINIC_ETL_DATABASE") {
            config.database_name = database;
        }
        if let Some(delimiter) = lookup("CLINIC_ETL_DELIMITER") {
            config.delimiter = parse_delimiter(&delimiter)?;
        }
        if let Some(raw) = lookup("CLINIC_ETL_RAW_COLLECTION") {
            config.raw_collection = raw;
        }
        if let Some(staging) = lookup("CLINIC_ETL_STAGING_COLLECTION") {
            config.staging_collection = staging;
        }
        if let Some(prefix) = lookup("CLINIC_ETL_PARTITION_PREFIX") {
            config.partition.prefix = prefix;
        }
        if let Some(days) = lookup("CLINIC_ETL_RECENCY_DAYS") {
            config.partition.recency_days = days
                .trim()
                .parse()
                .with_context(|| format!("Invalid CLINIC_ETL_RECENCY_DAYS '{}'", days))?;
        }
        if let Some(comparison) = lookup("CLINIC_ETL_RECENCY_COMPARISON") {
            config.partition.comparison = comparison
                .parse()
                .context("Invalid CLINIC_ETL_RECENCY_COMPARISON")?;
        }

        Ok(config)
    }

    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into();
        self
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_recency_comparison(mut self, comparison: RecencyComparison) -> Self {
        self.partition.comparison = comparison;
        self
    }

    pub fn with_recency_days(mut self, days: i64) -> Self {
        self.partition.recency_days = days;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_url.trim().is_empty() {
            anyhow::bail!("Store URL cannot be empty");
        }

        if self.database_name.trim().is_empty() {
            anyhow::bail!("Database name cannot be empty");
        }

        if self.raw_collection.trim().is_empty() || self.staging_collection.trim().is_empty() {
            anyhow::bail!("Raw and staging collection names cannot be empty");
        }

        if self.raw_collection == self.staging_collection {
            anyhow::bail!(
                "Raw and staging collections must differ (both '{}')",
                self.raw_collection
            );
        }

        // Partitions share the namespace with the raw and staging collections
        let prefix = &self.partition.prefix;
        for collection in [&self.raw_collection, &self.staging_collection] {
            if collection.starts_with(prefix.as_str()) {
                anyhow::bail!(
                    "Collection '{}' would collide with partition prefix '{}'",
                    collection,
                    prefix
                );
            }
        }

        if self.partition.recency_days < 0 {
            anyhow::bail!(
                "Recency threshold must not be negative (got {})",
                self.partition.recency_days
            );
        }

        if self.delimiter.is_alphanumeric() || self.delimiter == '\n' || self.delimiter == '\r' {
            anyhow::bail!("Delimiter {:?} cannot separate fields", self.delimiter);
        }

        Ok(())
    }
}

fn parse_delimiter(value: &str) -> anyhow::Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => anyhow::bail!(
            "CLINIC_ETL_DELIMITER must be a single character, got '{}'",
            value
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EtlConfig::default();
        assert_eq!(config.database_name, "Hospital");
        assert_eq!(config.raw_collection, "Customers");
        assert_eq!(config.staging_collection, "Staging_data");
        assert_eq!(config.delimiter, '|');
        assert_eq!(config.partition.prefix, "Table_");
        assert_eq!(config.partition.recency_days, 30);
        assert_eq!(config.partition.comparison, RecencyComparison::Lexical);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EtlConfig::from_lookup(lookup(&[
            ("CLINIC_ETL_INPUT", "/tmp/in.txt"),
            ("CLINIC_ETL_STORE", ":memory:"),
            ("CLINIC_ETL_DATABASE", "Clinic"),
            ("CLINIC_ETL_DELIMITER", ";"),
            ("CLINIC_ETL_PARTITION_PREFIX", "Region_"),
            ("CLINIC_ETL_RECENCY_DAYS", "14"),
            ("CLINIC_ETL_RECENCY_COMPARISON", "chronological"),
        ]))
        .unwrap();

        assert_eq!(config.input_path, PathBuf::from("/tmp/in.txt"));
        assert_eq!(config.store_url, MEMORY_STORE_URL);
        assert_eq!(config.database_name, "Clinic");
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.partition.prefix, "Region_");
        assert_eq!(config.partition.recency_days, 14);
        assert_eq!(config.partition.comparison, RecencyComparison::Chronological);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(EtlConfig::from_lookup(lookup(&[("CLINIC_ETL_RECENCY_DAYS", "soon")])).is_err());
        assert!(EtlConfig::from_lookup(lookup(&[("CLINIC_ETL_DELIMITER", "||")])).is_err());
        assert!(
            EtlConfig::from_lookup(lookup(&[("CLINIC_ETL_RECENCY_COMPARISON", "numeric")])).is_err()
        );
    }

    #[test]
    fn test_overrides_apply_before_validation() {
        let config = EtlConfig::from_lookup(lookup(&[("CLINIC_ETL_STORE", "")])).unwrap();
        assert!(config.validate().is_err());

        let config = config.with_store_url(MEMORY_STORE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(EtlConfig::default().with_database_name(" ").validate().is_err());
        assert!(EtlConfig::default().with_recency_days(-1).validate().is_err());
        assert!(EtlConfig::default().with_store_url("").validate().is_err());

        let mut same = EtlConfig::default();
        same.staging_collection = same.raw_collection.clone();
        assert!(same.validate().is_err());

        let mut colliding = EtlConfig::default();
        colliding.staging_collection = "Table_staging".to_string();
        assert!(colliding.validate().is_err());

        let mut alnum = EtlConfig::default();
        alnum.delimiter = 'x';
        assert!(alnum.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("CLINIC_ETL_DATABASE", "EnvClinic");
        std::env::set_var("CLINIC_ETL_RECENCY_DAYS", "45");

        let config = EtlConfig::from_env().unwrap();

        std::env::remove_var("CLINIC_ETL_DATABASE");
        std::env::remove_var("CLINIC_ETL_RECENCY_DAYS");

        assert_eq!(config.database_name, "EnvClinic");
        assert_eq!(config.partition.recency_days, 45);
    }
}
