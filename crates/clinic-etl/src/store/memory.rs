//! In-process document store

use async_trait::async_trait;
use clinic_common::{EtlError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::DocumentStore;
use crate::models::{Document, ID_FIELD};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    collections: BTreeMap<String, Vec<Document>>,
    writes: u64,
}

impl MemoryState {
    fn collection_mut(&mut self, name: &str) -> &mut Vec<Document> {
        if !self.collections.contains_key(name) {
            self.writes += 1;
        }
        self.collections.entry(name.to_string()).or_default()
    }

    fn assign_id(&mut self, mut document: Document) -> Document {
        self.next_id += 1;
        document.insert(ID_FIELD.to_string(), Value::from(self.next_id));
        document
    }
}

/// Document store kept entirely in memory
///
/// Used for dry runs (`--store :memory:`) and tests. Counts every mutating call
/// so callers can assert that a pass was write-free.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutations applied so far (inserted documents, updates, created collections)
    pub fn write_count(&self) -> u64 {
        self.lock().map(|state| state.writes).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| EtlError::store(format!("Failed to acquire store lock: {}", e)))
    }
}

fn matches(document: &Document, field: &str, value: &str) -> bool {
    matches!(document.get(field), Some(Value::String(s)) if s == value)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        let mut state = self.lock()?;
        let count = documents.len();
        let stamped: Vec<Document> = documents.into_iter().map(|d| state.assign_id(d)).collect();
        state.collection_mut(collection).extend(stamped);
        state.writes += count as u64;
        Ok(count)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        let mut state = self.lock()?;
        let stamped = state.assign_id(document);
        state.collection_mut(collection).push(stamped);
        state.writes += 1;
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let state = self.lock()?;
        Ok(state.collections.get(collection).cloned().unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let state = self.lock()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, field, value)))
            .cloned())
    }

    async fn update_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        fields: Document,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let Some(target) = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, field, value)))
        else {
            return Ok(false);
        };

        for (key, val) in fields {
            if key != ID_FIELD {
                target.insert(key, val);
            }
        }
        state.writes += 1;
        Ok(true)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.collection_mut(name);
        Ok(())
    }
}
