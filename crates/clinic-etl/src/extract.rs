//! Raw record extraction
//!
//! Reads the delimited customer file and loads every data row into the raw
//! collection, one document per row.
//!
//! # File Format
//! ```text
//! H|Customer_Name|Customer_Id|Open_Date|Last_Consulted_Date|...
//! D|Alex|123457|20101012|20121013|...
//! ```
//! The first token of every line is a row-type marker and is discarded. Rows are
//! zipped positionally with the header: short rows lack the trailing keys, extra
//! values are dropped.

use clinic_common::{EtlError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::RawRecord;
use crate::store::DocumentStore;

pub const DEFAULT_DELIMITER: char = '|';
const HEADER_MARKER: &str = "H";
const DATA_MARKER: &str = "D";

/// Header plus data rows parsed from one input file
#[derive(Debug, Clone, Default)]
pub struct ParsedInput {
    pub header: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Outcome of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Non-blank lines after the header
    pub data_lines: usize,
    /// Documents written to the raw collection
    pub inserted: usize,
}

/// Parser and loader for the delimited customer file
pub struct RawRecordExtractor {
    delimiter: char,
}

impl RawRecordExtractor {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Split a line, returning its row marker and trimmed values
    fn split_line<'a>(&self, line: &'a str) -> (&'a str, Vec<String>) {
        let mut tokens = line.trim().split(self.delimiter);
        let marker = tokens.next().unwrap_or_default().trim();
        (marker, tokens.map(|t| t.trim().to_string()).collect())
    }

    /// Parse file contents: the first line is the header, every later non-blank line a record
    pub fn parse_str(&self, content: &str) -> ParsedInput {
        let mut lines = content.lines();

        let Some(header_line) = lines.next() else {
            return ParsedInput::default();
        };
        let (marker, header) = self.split_line(header_line);
        if marker != HEADER_MARKER {
            debug!(marker, "Header line does not start with the header marker");
        }

        let mut records = Vec::new();
        for (idx, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_num = idx + 2;

            let (marker, values) = self.split_line(line);
            if marker != DATA_MARKER {
                debug!(line = line_num, marker, "Data row with unexpected marker");
            }
            if values.len() != header.len() {
                debug!(
                    line = line_num,
                    values = values.len(),
                    columns = header.len(),
                    "Row width differs from header"
                );
            }

            records.push(RawRecord::from_row(&header, values));
        }

        ParsedInput { header, records }
    }

    /// Read and parse the input file
    pub async fn read_file(&self, path: &Path) -> Result<ParsedInput> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| EtlError::InputUnavailable {
                path: path.display().to_string(),
                source,
            })?;
        Ok(self.parse_str(&content))
    }

    /// Parse the file at `path` and bulk-load its rows into `collection`
    ///
    /// An input without data rows is not an error; nothing is written.
    pub async fn extract(
        &self,
        path: &Path,
        store: &dyn DocumentStore,
        collection: &str,
    ) -> Result<ExtractReport> {
        info!(path = %path.display(), collection, "Extracting raw customer records");

        let parsed = self.read_file(path).await?;
        let data_lines = parsed.records.len();

        if parsed.records.is_empty() {
            warn!(path = %path.display(), "No data rows found, nothing to insert");
            return Ok(ExtractReport {
                data_lines,
                inserted: 0,
            });
        }

        let documents = parsed.records.iter().map(RawRecord::to_document).collect();
        let inserted = store.insert_many(collection, documents).await?;

        info!(
            collection,
            inserted,
            columns = parsed.header.len(),
            "Raw records inserted"
        );

        Ok(ExtractReport {
            data_lines,
            inserted,
        })
    }
}

impl Default for RawRecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}
