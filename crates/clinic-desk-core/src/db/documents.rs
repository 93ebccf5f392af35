//! Document operations, one JSON object per record.

use rusqlite::{params, Connection};
use serde_json::{Map, Value};

use super::{Database, DbError, DbResult};
use crate::models::EntityId;

impl Database {
    /// All documents of a collection, in insertion order.
    pub fn list_documents(&self, collection: &str) -> DbResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT body
            FROM documents
            WHERE collection = ?
            ORDER BY seq
            "#,
        )?;

        let rows = stmt.query_map([collection], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for body in rows {
            documents.push(serde_json::from_str(&body?)?);
        }
        Ok(documents)
    }

    /// Insert a document, assigning the next numeric id when it has none.
    ///
    /// Returns the stored document.
    pub fn insert_document(&self, collection: &str, body: Value) -> DbResult<Value> {
        insert_into(&self.conn, collection, body)
    }

    /// Replace the document `id`. The stored copy carries `id` whatever the
    /// body says. `None` when there is no such document.
    pub fn replace_document(
        &self,
        collection: &str,
        id: &EntityId,
        body: Value,
    ) -> DbResult<Option<Value>> {
        let mut object = into_object(body)?;
        object.insert("id".into(), serde_json::to_value(id)?);
        let document = Value::Object(object);

        let rows_affected = self.conn.execute(
            r#"
            UPDATE documents SET
                body = ?3,
                updated_at = datetime('now')
            WHERE collection = ?1 AND record_id = ?2
            "#,
            params![collection, id.normalized(), serde_json::to_string(&document)?],
        )?;
        Ok((rows_affected > 0).then_some(document))
    }

    /// Delete the document `id`.
    pub fn delete_document(&self, collection: &str, id: &EntityId) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND record_id = ?",
            params![collection, id.normalized()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Number of documents in a collection.
    pub fn count_documents(&self, collection: &str) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Load a json-server style file: `{"patients": [...], "rendezvous": [...]}`.
    ///
    /// Existing ids are kept. Keys whose value is not an array are skipped.
    /// All-or-nothing; returns the number of documents inserted.
    pub fn seed_from_json(&mut self, json: &str) -> DbResult<usize> {
        let root: Value = serde_json::from_str(json)?;
        let collections = match root {
            Value::Object(map) => map,
            _ => {
                return Err(DbError::InvalidDocument(
                    "seed must be an object of collections".into(),
                ))
            }
        };

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for (collection, records) in collections {
            let Value::Array(records) = records else {
                continue;
            };
            for record in records {
                insert_into(&tx, &collection, record)?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

fn into_object(body: Value) -> DbResult<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(DbError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn insert_into(conn: &Connection, collection: &str, body: Value) -> DbResult<Value> {
    let mut object = into_object(body)?;

    let given = object.get("id").filter(|v| !v.is_null()).cloned();
    let id = match given {
        None => {
            let id = EntityId::Int(next_numeric_id(conn, collection)?);
            object.insert("id".into(), serde_json::to_value(&id)?);
            id
        }
        Some(raw) => serde_json::from_value::<EntityId>(raw.clone())
            .map_err(|_| DbError::InvalidDocument(format!("unusable id {}", raw)))?,
    };

    let document = Value::Object(object);
    conn.execute(
        r#"
        INSERT INTO documents (collection, record_id, body)
        VALUES (?1, ?2, ?3)
        "#,
        params![collection, id.normalized(), serde_json::to_string(&document)?],
    )?;
    Ok(document)
}

/// One past the largest all-digit id in the collection.
fn next_numeric_id(conn: &Connection, collection: &str) -> DbResult<i64> {
    let next = conn.query_row(
        r#"
        SELECT COALESCE(MAX(CAST(record_id AS INTEGER)), 0) + 1
        FROM documents
        WHERE collection = ?
          AND record_id <> ''
          AND record_id NOT GLOB '*[^0-9]*'
        "#,
        [collection],
        |row| row.get(0),
    )?;
    Ok(next)
}
