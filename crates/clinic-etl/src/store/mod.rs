//! Document store abstraction
//!
//! The pipeline only needs a handful of collection-level operations, so every
//! backend implements [`DocumentStore`] and stages receive a `&dyn DocumentStore`.
//!
//! Semantics shared by all backends:
//! - inserting into an unknown collection creates it
//! - [`DocumentStore::create_collection`] is idempotent
//! - [`DocumentStore::find_all`] returns documents in insertion order, each carrying
//!   its store-assigned [`crate::models::ID_FIELD`]
//! - [`DocumentStore::update_one`] overwrites only the given fields (`$set` semantics)

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use clinic_common::Result;
use tracing::info;

use crate::config::{EtlConfig, MEMORY_STORE_URL};
use crate::models::Document;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Collection-oriented document store used by every pipeline stage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs ("memory", "sqlite")
    fn backend(&self) -> &str;

    /// Insert a batch of documents, returning how many were written
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Every document in the collection; an unknown collection is empty
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// First document whose `field` equals the string `value`
    async fn find_one(&self, collection: &str, field: &str, value: &str)
        -> Result<Option<Document>>;

    /// Overwrite `fields` on the first document whose `field` equals `value`
    ///
    /// Returns `false` when nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        fields: Document,
    ) -> Result<bool>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn create_collection(&self, name: &str) -> Result<()>;
}

/// Open the backend named by `config.store_url`
///
/// `:memory:` selects the in-process store, anything else is a SQLite file path.
pub fn open_store(config: &EtlConfig) -> Result<Box<dyn DocumentStore>> {
    if config.store_url == MEMORY_STORE_URL {
        info!(database = %config.database_name, "Using in-memory document store");
        return Ok(Box::new(MemoryDocumentStore::new()));
    }

    info!(
        path = %config.store_url,
        database = %config.database_name,
        "Opening SQLite document store"
    );
    let store = SqliteDocumentStore::open(&config.store_url, &config.database_name)?;
    Ok(Box::new(store))
}
