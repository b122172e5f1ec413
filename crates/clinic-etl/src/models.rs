//! Record shapes for each pipeline stage
//!
//! Documents move between stages as `serde_json` objects; the typed structs here
//! give the staging and partition stages a fixed, checked shape.

use clinic_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A schemaless document as held by a [`crate::store::DocumentStore`]
pub type Document = serde_json::Map<String, Value>;

/// Store-assigned identifier attached to documents read back from a store
pub const ID_FIELD: &str = "_id";

/// Raw field names expected in the input file header
pub mod raw_fields {
    pub const CUSTOMER_NAME: &str = "Customer_Name";
    pub const CUSTOMER_ID: &str = "Customer_Id";
    pub const OPEN_DATE: &str = "Open_Date";
    pub const LAST_CONSULTED_DATE: &str = "Last_Consulted_Date";
    pub const VACCINATION_ID: &str = "Vaccination_Id";
    pub const DR_NAME: &str = "Dr_Name";
    pub const STATE: &str = "State";
    pub const COUNTRY: &str = "Country";
    pub const DOB: &str = "DOB";
    pub const IS_ACTIVE: &str = "Is_Active";

    /// Fields that must be present and non-empty for a record to reach staging
    pub const MANDATORY: [&str; 3] = [CUSTOMER_NAME, CUSTOMER_ID, OPEN_DATE];
}

/// Canonical staging field names
pub mod staging_fields {
    pub const NAME: &str = "Name";
    pub const CUST_ID: &str = "Cust_I";
    pub const OPEN_DT: &str = "Open_Dt";
    pub const CONSUL_DT: &str = "Consul_Dt";
    pub const VAC_ID: &str = "VAC_ID";
    pub const DR_NAME: &str = "DR_Name";
    pub const STATE: &str = "State";
    pub const COUNTY: &str = "County";
    pub const DOB: &str = "DOB";
    pub const FLAG: &str = "FLAG";

    pub const ALL: [&str; 10] = [
        NAME, CUST_ID, OPEN_DT, CONSUL_DT, VAC_ID, DR_NAME, STATE, COUNTY, DOB, FLAG,
    ];
}

/// One data row of the input file, keyed by header name in header order
///
/// Rows shorter than the header simply lack the trailing keys. A repeated
/// header name keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    values: Vec<(String, String)>,
}

impl RawRecord {
    /// Zip header names with row values positionally; surplus values are dropped
    pub fn from_row(header: &[String], values: Vec<String>) -> Self {
        let mut fields: Vec<(String, String)> = Vec::with_capacity(header.len());
        for (name, value) in header.iter().zip(values) {
            match fields.iter_mut().find(|(k, _)| k == name) {
                Some(existing) => existing.1 = value,
                None => fields.push((name.clone(), value)),
            }
        }
        Self { values: fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    /// Field names and values in header order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_document(&self) -> Document {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// Canonical, validated customer record awaiting partitioning
///
/// Optional fields keep their absence as `null` rather than a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cust_I")]
    pub cust_id: String,
    #[serde(rename = "Open_Dt")]
    pub open_date: String,
    #[serde(rename = "Consul_Dt")]
    pub consult_date: Option<String>,
    #[serde(rename = "VAC_ID")]
    pub vaccination_id: Option<String>,
    #[serde(rename = "DR_Name")]
    pub doctor_name: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "County")]
    pub county: Option<String>,
    #[serde(rename = "DOB")]
    pub dob: Option<String>,
    #[serde(rename = "FLAG")]
    pub flag: Option<String>,
}

impl StagingRecord {
    pub fn to_document(&self) -> Result<Document> {
        to_document(self)
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document.clone()))?)
    }
}

/// Staging record enriched with metrics derived at partitioning time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedRecord {
    #[serde(flatten)]
    pub staging: StagingRecord,
    pub age: i32,
    pub days_since_last_consult: i64,
}

impl PartitionedRecord {
    pub fn to_document(&self) -> Result<Document> {
        to_document(self)
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(clinic_common::EtlError::store(format!(
            "expected an object document, got {}",
            other
        ))),
    }
}

/// Read a field as text: strings as-is, other scalars rendered, null/missing as `None`
pub fn text_field(document: &Document, field: &str) -> Option<String> {
    match document.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
