//! SQLite schema for the reference document store.
//!
//! - `documents` holds one row per document; schema fields live in
//!   `fields_json` as a serialized name → value map
//! - `seq` gives a stable insertion order used for paging
//! - `listeners` persists listener flags so they survive across processes
//! - `repository_meta` tracks the schema version

/// Migration v1: documents table plus repository metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE CHECK (length(trim(id)) > 0),
    doc_type TEXT NOT NULL CHECK (length(trim(doc_type)) > 0),
    lifecycle_state TEXT NOT NULL DEFAULT 'project',
    fields_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_documents_type_state
    ON documents(doc_type, lifecycle_state, seq);

CREATE TABLE IF NOT EXISTS repository_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO repository_meta (id, schema_version, created_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: persisted listener flags, seeded with the shipped listeners.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS listeners (
    name TEXT PRIMARY KEY CHECK (length(trim(name)) > 0),
    enabled INTEGER NOT NULL DEFAULT 1 CHECK (enabled IN (0, 1)),
    position INTEGER NOT NULL
);

INSERT OR IGNORE INTO listeners (name, enabled, position) VALUES
    ('dclistener', 1, 0),
    ('opchainlistener', 1, 1),
    ('opchainpclistener', 1, 2);

UPDATE repository_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by paging and stats queries.
pub const REQUIRED_INDEXES: &[&str] = &["idx_documents_type_state"];
