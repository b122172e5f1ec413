//! Staging transformation
//!
//! Validates raw documents and renames their fields into the canonical staging
//! schema. Records missing a mandatory field are dropped silently.

use clinic_common::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{raw_fields, text_field, Document, StagingRecord};
use crate::store::DocumentStore;

/// Outcome of one staging run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingReport {
    pub scanned: usize,
    pub loaded: usize,
    pub skipped_validation: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StagingTransformer;

impl StagingTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Map one raw document to a staging record
    ///
    /// Returns `None` when any of `Customer_Name`, `Customer_Id`, `Open_Date` is
    /// missing or empty. Optional fields absent from the raw document stay `None`.
    pub fn transform(&self, raw: &Document) -> Option<StagingRecord> {
        let mandatory = |field: &str| text_field(raw, field).filter(|v| !v.is_empty());
        let optional = |field: &str| text_field(raw, field);

        Some(StagingRecord {
            name: mandatory(raw_fields::CUSTOMER_NAME)?,
            cust_id: mandatory(raw_fields::CUSTOMER_ID)?,
            open_date: mandatory(raw_fields::OPEN_DATE)?,
            consult_date: optional(raw_fields::LAST_CONSULTED_DATE),
            vaccination_id: optional(raw_fields::VACCINATION_ID),
            doctor_name: optional(raw_fields::DR_NAME),
            state: optional(raw_fields::STATE),
            county: optional(raw_fields::COUNTRY),
            dob: optional(raw_fields::DOB),
            flag: optional(raw_fields::IS_ACTIVE),
        })
    }

    /// Transform every raw document and bulk-load the valid ones into `staging_collection`
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
        raw_collection: &str,
        staging_collection: &str,
    ) -> Result<StagingReport> {
        info!(
            from = raw_collection,
            to = staging_collection,
            "Transforming raw records into staging"
        );

        let raw = store.find_all(raw_collection).await?;
        let mut report = StagingReport {
            scanned: raw.len(),
            ..StagingReport::default()
        };

        let mut documents = Vec::with_capacity(raw.len());
        for document in &raw {
            match self.transform(document) {
                Some(record) => documents.push(record.to_document()?),
                None => {
                    report.skipped_validation += 1;
                    let customer_id = text_field(document, raw_fields::CUSTOMER_ID);
                    debug!(customer_id = ?customer_id, "Raw record missing a mandatory field");
                },
            }
        }

        if documents.is_empty() {
            info!(
                scanned = report.scanned,
                "No valid records, nothing to load into staging"
            );
            return Ok(report);
        }

        report.loaded = store.insert_many(staging_collection, documents).await?;

        info!(
            scanned = report.scanned,
            loaded = report.loaded,
            skipped = report.skipped_validation,
            "Staging load complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::staging_fields;
    use crate::store::MemoryDocumentStore;
    use serde_json::{json, Value};

    fn raw(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn full_raw() -> Document {
        raw(json!({
            "Customer_Name": "Alex",
            "Customer_Id": "123457",
            "Open_Date": "20101012",
            "Last_Consulted_Date": "20121013",
            "Vaccination_Id": "MVD",
            "Dr_Name": "Paul",
            "State": "SA",
            "Country": "USA",
            "DOB": "06031987",
            "Is_Active": "A"
        }))
    }

    #[test]
    fn test_transform_renames_every_field() {
        let record = StagingTransformer::new().transform(&full_raw()).unwrap();
        let doc = record.to_document().unwrap();

        assert_eq!(doc["Name"], json!("Alex"));
        assert_eq!(doc["Cust_I"], json!("123457"));
        assert_eq!(doc["Open_Dt"], json!("20101012"));
        assert_eq!(doc["Consul_Dt"], json!("20121013"));
        assert_eq!(doc["VAC_ID"], json!("MVD"));
        assert_eq!(doc["DR_Name"], json!("Paul"));
        assert_eq!(doc["State"], json!("SA"));
        assert_eq!(doc["County"], json!("USA"));
        assert_eq!(doc["DOB"], json!("06031987"));
        assert_eq!(doc["FLAG"], json!("A"));
        assert_eq!(doc.len(), staging_fields::ALL.len());
    }

    #[test]
    fn test_transform_requires_mandatory_fields() {
        let transformer = StagingTransformer::new();
        for field in raw_fields::MANDATORY {
            let mut missing = full_raw();
            missing.remove(field);
            assert!(transformer.transform(&missing).is_none(), "{} absent", field);

            let mut empty = full_raw();
            empty.insert(field.to_string(), json!(""));
            assert!(transformer.transform(&empty).is_none(), "{} empty", field);
        }
    }

    #[test]
    fn test_transform_keeps_missing_optionals_null() {
        let record = StagingTransformer::new()
            .transform(&raw(json!({
                "_id": 9,
                "Customer_Name": "John",
                "Customer_Id": "123458",
                "Open_Date": "20101012"
            })))
            .unwrap();
        let doc = record.to_document().unwrap();

        assert_eq!(doc["County"], Value::Null);
        assert_eq!(doc["DOB"], Value::Null);
        assert!(!doc.contains_key("_id"));
    }

    #[tokio::test]
    async fn test_run_loads_valid_and_counts_skips() {
        let store = MemoryDocumentStore::new();
        let mut invalid = full_raw();
        invalid.remove("Open_Date");
        store
            .insert_many("Customers", vec![full_raw(), invalid, full_raw()])
            .await
            .unwrap();

        let report = StagingTransformer::new()
            .run(&store, "Customers", "Staging_data")
            .await
            .unwrap();

        assert_eq!(
            report,
            StagingReport {
                scanned: 3,
                loaded: 2,
                skipped_validation: 1
            }
        );
        assert_eq!(store.find_all("Staging_data").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_with_nothing_valid_writes_nothing() {
        let store = MemoryDocumentStore::new();
        store
            .insert_many("Customers", vec![raw(json!({"Customer_Name": "x"}))])
            .await
            .unwrap();
        let writes = store.write_count();

        let report = StagingTransformer::new()
            .run(&store, "Customers", "Staging_data")
            .await
            .unwrap();

        assert_eq!(report.loaded, 0);
        assert_eq!(report.skipped_validation, 1);
        assert_eq!(store.write_count(), writes);
    }
}
