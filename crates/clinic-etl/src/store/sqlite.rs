//! SQLite-backed document store
//!
//! Documents are stored as JSON text in a single `documents` table, partitioned by
//! `(namespace, collection)`. The namespace is the configured database name, so
//! several logical databases can share one file.

use async_trait::async_trait;
use clinic_common::{EtlError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::DocumentStore;
use crate::models::{Document, ID_FIELD};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (namespace, name)
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace TEXT NOT NULL,
    collection TEXT NOT NULL,
    body TEXT NOT NULL  -- JSON object
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents (namespace, collection, id);
"#;

fn sql_err(action: &str) -> impl FnOnce(rusqlite::Error) -> EtlError + '_ {
    move |e| EtlError::store(format!("Failed to {}: {}", action, e))
}

/// JSON path for a top-level key, quoted so names like `Cust_I` or `a.b` stay literal
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn decode(id: i64, body: &str) -> Result<Document> {
    let mut document: Document = serde_json::from_str(body)?;
    document.insert(ID_FIELD.to_string(), Value::from(id));
    Ok(document)
}

fn encode(document: &Document) -> Result<String> {
    let mut body = document.clone();
    body.remove(ID_FIELD);
    Ok(serde_json::to_string(&body)?)
}

/// Document store persisted in a SQLite file
pub struct SqliteDocumentStore {
    db: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SqliteDocumentStore {
    /// Open (or create) the store file and initialise its schema
    pub fn open(path: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(sql_err("open document store"))?;
        Self::with_connection(conn, namespace)
    }

    /// Store backed by a private in-memory SQLite database
    pub fn open_in_memory(namespace: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err("open in-memory store"))?;
        Self::with_connection(conn, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(sql_err("initialise store schema"))?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| EtlError::store(format!("Failed to acquire database lock: {}", e)))
    }

    fn ensure_collection(&self, conn: &Connection, name: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO collections (namespace, name) VALUES (?1, ?2)",
            params![self.namespace, name],
        )
        .map_err(sql_err("register collection"))?;
        Ok(())
    }

    fn find_row(
        &self,
        conn: &Connection,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<(i64, String)>> {
        conn.query_row(
            r#"
            SELECT id, body FROM documents
            WHERE namespace = ?1 AND collection = ?2 AND json_extract(body, ?3) = ?4
            ORDER BY id
            LIMIT 1
            "#,
            params![self.namespace, collection, json_path(field), value],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(sql_err("look up document"))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql_err("begin transaction"))?;

        self.ensure_collection(&tx, collection)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO documents (namespace, collection, body) VALUES (?1, ?2, ?3)")
                .map_err(sql_err("prepare insert"))?;
            for document in &documents {
                stmt.execute(params![self.namespace, collection, encode(document)?])
                    .map_err(sql_err("insert document"))?;
            }
        }

        tx.commit().map_err(sql_err("commit batch insert"))?;
        debug!(collection, count = documents.len(), "Batch inserted documents");
        Ok(documents.len())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        let conn = self.conn()?;
        self.ensure_collection(&conn, collection)?;
        conn.execute(
            "INSERT INTO documents (namespace, collection, body) VALUES (?1, ?2, ?3)",
            params![self.namespace, collection, encode(&document)?],
        )
        .map_err(sql_err("insert document"))?;
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, body FROM documents WHERE namespace = ?1 AND collection = ?2 ORDER BY id",
            )
            .map_err(sql_err("prepare scan"))?;

        let rows = stmt
            .query_map(params![self.namespace, collection], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql_err("scan collection"))?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(sql_err("read document row"))?;
            documents.push(decode(id, &body)?);
        }
        Ok(documents)
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let conn = self.conn()?;
        match self.find_row(&conn, collection, field, value)? {
            Some((id, body)) => Ok(Some(decode(id, &body)?)),
            None => Ok(None),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        fields: Document,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let Some((id, body)) = self.find_row(&conn, collection, field, value)? else {
            return Ok(false);
        };

        let mut document: Document = serde_json::from_str(&body)?;
        for (key, val) in fields {
            if key != ID_FIELD {
                document.insert(key, val);
            }
        }

        conn.execute(
            "UPDATE documents SET body = ?1 WHERE id = ?2",
            params![encode(&document)?, id],
        )
        .map_err(sql_err("update document"))?;
        Ok(true)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM collections WHERE namespace = ?1 ORDER BY name")
            .map_err(sql_err("prepare collection listing"))?;
        let names = stmt
            .query_map(params![self.namespace], |row| row.get::<_, String>(0))
            .map_err(sql_err("list collections"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err("read collection name"))?;
        Ok(names)
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        self.ensure_collection(&conn, name)
    }
}
