//! Clinic ETL Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the clinic ETL workspace.
//!
//! - **Error Handling**: [`EtlError`] and the [`Result`] alias used by every stage
//! - **Logging**: `tracing` subscriber configuration shared by binaries and tests
//!
//! # Example
//!
//! ```no_run
//! use clinic_common::logging::{init_logging, LogConfig};
//! use clinic_common::{EtlError, Result};
//!
//! fn open_input(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).map_err(|source| EtlError::InputUnavailable {
//!         path: path.to_string(),
//!         source,
//!     })
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let _contents = open_input("./data/customers.txt")?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{EtlError, Result};
