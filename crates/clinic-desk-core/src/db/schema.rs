//! SQLite schema definition.

/// Schema for the local document backend.
///
/// Every collection lives in one table as JSON documents. `seq` keeps
/// insertion order, which is the order listings come back in.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    record_id TEXT NOT NULL,                     -- textual form of the record id
    body TEXT NOT NULL,                          -- JSON object, id included
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (collection, record_id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);
"#;
