//! SQLite-backed document store
//!
//! Schema:
//!   - documents: (collection, id) -> JSON text

use crate::document_store::DocumentStore;
use crate::error::{Result, StoreError};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

#[allow(clippy::result_large_err)]
impl SqliteDocumentStore {
    /// Open the store (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for read-write concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("document store lock poisoned".to_string()))
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[allow(clippy::result_large_err)]
impl DocumentStore for SqliteDocumentStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT value FROM documents WHERE collection = ? AND id = ?")?;
        let result = stmt.query_row(params![collection, id], |row| row.get::<_, String>(0));

        match result {
            Ok(value) => Ok(Some(serde_json::from_str(&value)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        let value = serde_json::to_string(document)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, value) VALUES (?, ?, ?)",
            params![collection, id, value],
        )?;

        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
        )?;
        Ok(affected > 0)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT id, value FROM documents WHERE collection = ? ORDER BY id")?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, value) = row?;
            documents.push((id, serde_json::from_str(&value)?));
        }

        Ok(documents)
    }
}
