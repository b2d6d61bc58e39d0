//! SQLite-backed store implementations.

use async_trait::async_trait;
use chrono::Utc;
use fincache_core::{DataError, DocumentStore, KeyValueStore, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

fn local_err(e: impl ToString) -> DataError {
    DataError::storage("local", e)
}

fn remote_err(e: impl ToString) -> DataError {
    DataError::storage("remote", e)
}

/// Persistent key-value store in a SQLite database file.
///
/// Gives the local tier storage that survives restarts.
#[derive(Debug)]
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open or create a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(local_err)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store. Data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(local_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(local_err)?;
        debug!("SQLite key-value schema initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(local_err)?;
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(local_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(local_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(local_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(local_err)?;
        let deleted = conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(local_err)?;
        Ok(deleted > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(local_err)?;
        let mut stmt = conn
            .prepare("SELECT key FROM kv_store ORDER BY key")
            .map_err(local_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(local_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(local_err)
    }
}

/// Durable document store in a SQLite database, one row per document.
///
/// Batch deletes run in a single transaction so they apply all-or-nothing.
#[derive(Debug)]
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open or create a store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(remote_err)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store. Data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(remote_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                owner TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner, doc_id)
            )",
            [],
        )
        .map_err(remote_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner)",
            [],
        )
        .map_err(remote_err)?;

        debug!("SQLite document schema initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self))]
    async fn get(&self, owner: &str, doc_id: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().map_err(remote_err)?;
        let body = conn
            .query_row(
                "SELECT body FROM documents WHERE owner = ?1 AND doc_id = ?2",
                params![owner, doc_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(remote_err)?;

        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, doc))]
    async fn set(&self, owner: &str, doc_id: &str, doc: Value) -> Result<()> {
        let body = serde_json::to_string(&doc)?;
        let conn = self.conn.lock().map_err(remote_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (owner, doc_id, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![owner, doc_id, body, Utc::now().to_rfc3339()],
        )
        .map_err(remote_err)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner: &str, doc_id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(remote_err)?;
        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE owner = ?1 AND doc_id = ?2",
                params![owner, doc_id],
            )
            .map_err(remote_err)?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn list(&self, owner: &str) -> Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().map_err(remote_err)?;
        let mut stmt = conn
            .prepare("SELECT doc_id, body FROM documents WHERE owner = ?1 ORDER BY doc_id")
            .map_err(remote_err)?;
        let rows = stmt
            .query_map(params![owner], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(remote_err)?;

        let mut docs = Vec::new();
        for row in rows {
            let (doc_id, body) = row.map_err(remote_err)?;
            docs.push((doc_id, serde_json::from_str(&body)?));
        }
        Ok(docs)
    }

    #[instrument(skip(self, doc_ids), fields(count = doc_ids.len()))]
    async fn batch_delete(&self, owner: &str, doc_ids: &[String]) -> Result<usize> {
        let conn = self.conn.lock().map_err(remote_err)?;
        let tx = conn.unchecked_transaction().map_err(remote_err)?;

        let mut deleted = 0usize;
        for doc_id in doc_ids {
            deleted += tx
                .execute(
                    "DELETE FROM documents WHERE owner = ?1 AND doc_id = ?2",
                    params![owner, doc_id],
                )
                .map_err(remote_err)?;
        }

        tx.commit().map_err(remote_err)?;
        debug!("Batch deleted {} documents", deleted);
        Ok(deleted)
    }
}
