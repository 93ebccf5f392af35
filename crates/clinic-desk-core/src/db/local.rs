//! `Transport` over the local SQLite backend.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{Database, DbResult};
use crate::models::EntityId;
use crate::store::{Transport, TransportError, TransportResult};

/// Serves every collection from one local database.
///
/// Calls run inline on the caller's task; SQLite work here is small enough
/// that it never needs a blocking pool.
#[derive(Clone)]
pub struct LocalTransport {
    db: Arc<Mutex<Database>>,
}

impl LocalTransport {
    /// Wrap an open database.
    pub fn new(db: Database) -> Self {
        Self::from_shared(Arc::new(Mutex::new(db)))
    }

    /// Share a database with other holders.
    pub fn from_shared(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// In-memory backend.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// The underlying database handle.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> DbResult<R>) -> TransportResult<R> {
        let db = self
            .db
            .lock()
            .map_err(|e| TransportError::Backend(format!("Lock poisoned: {}", e)))?;
        f(&*db).map_err(Into::into)
    }
}

fn not_found(collection: &str, id: &EntityId) -> TransportError {
    TransportError::NotFound {
        collection: collection.to_string(),
        id: id.normalized(),
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn list(&self, collection: &str) -> TransportResult<Vec<Value>> {
        self.with_db(|db| db.list_documents(collection))
    }

    async fn create(&self, collection: &str, draft: Value) -> TransportResult<Value> {
        self.with_db(|db| db.insert_document(collection, draft))
    }

    async fn replace(&self, collection: &str, id: &EntityId, record: Value) -> TransportResult<Value> {
        self.with_db(|db| db.replace_document(collection, id, record))?
            .ok_or_else(|| not_found(collection, id))
    }

    async fn delete(&self, collection: &str, id: &EntityId) -> TransportResult<()> {
        if self.with_db(|db| db.delete_document(collection, id))? {
            Ok(())
        } else {
            Err(not_found(collection, id))
        }
    }
}
