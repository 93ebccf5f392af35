//! Local SQLite backend.
//!
//! Stands in for the remote data service when the front desk runs offline,
//! and backs the end-to-end tests.

mod documents;
mod local;
mod schema;

pub use local::*;
pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::store::TransportError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for TransportError {
    fn from(e: DbError) -> Self {
        TransportError::Backend(e.to_string())
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn test_reopen_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert_document("patients", serde_json::json!({"nom": "Idrissi"}))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_documents("patients").unwrap(), 1);
    }
}
