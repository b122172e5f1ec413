//! Error types for the clinic ETL pipeline

use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Main error type for the ETL pipeline
///
/// Per-record faults never surface as an `EtlError` to the caller of a stage;
/// they are folded into the stage report. This type covers faults that end a
/// stage (input unavailable, store unreachable) and the per-record causes that
/// get recorded alongside an outcome.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Input unavailable at '{path}': {source}")]
    InputUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid {field} date '{value}'")]
    DateParse { field: String, value: String },

    #[error("Invalid partition name: {0}")]
    InvalidPartition(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Shorthand for store-layer failures
    pub fn store(message: impl Into<String>) -> Self {
        EtlError::Store(message.into())
    }

    /// Shorthand for configuration failures
    pub fn config(message: impl Into<String>) -> Self {
        EtlError::Config(message.into())
    }
}
