//! Shared fixtures for clinic-etl integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "H|Customer_Name|Customer_Id|Open_Date|Last_Consulted_Date|Vaccination_Id|Dr_Name|State|Country|DOB|Is_Active";

/// Reference date used by every test run
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

/// A data row in input-file format
pub fn row(name: &str, id: &str, consulted: &str, country: &str, dob: &str) -> String {
    format!(
        "D|{}|{}|20101012|{}|MVD|Paul|SA|{}|{}|A",
        name, id, consulted, country, dob
    )
}

/// Header plus rows, newline-terminated
pub fn input(rows: &[String]) -> String {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    content
}

/// Mixed batch: three valid regions, one stale record, one missing county,
/// one failing validation and one short row
pub fn sample_rows() -> Vec<String> {
    vec![
        row("Alex", "123457", "20240101", "USA", "06031987"),
        row("John", "123458", "20240101", "India", "15061990"),
        row("Mathew", "123459", "20240101", "Philippine", "16061990"),
        row("Matt", "123460", "20240610", "USA", "06031987"),
        row("Jacob", "123461", "20240101", "", "06031987"),
        row("", "123462", "20240101", "USA", "06031987"),
        "D|Josh|123463|20101012".to_string(),
    ]
}

/// Write `content` to `dir/name`
pub fn write_input(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Route test logs through the test harness; safe to call from every test
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("clinic_etl=debug")
        .with_test_writer()
        .try_init();
}
