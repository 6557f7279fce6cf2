use rusqlite::Connection;

use crate::errors::GraphStoreError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphStoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_entities (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            data      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            from_id   INTEGER NOT NULL,
            to_id     INTEGER NOT NULL,
            edge_type TEXT NOT NULL,
            data      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_labels (
            entity_id INTEGER NOT NULL,
            label     TEXT NOT NULL,
            UNIQUE(entity_id, label)
        );
        CREATE TABLE IF NOT EXISTS graph_catalog (
            name      TEXT PRIMARY KEY,
            status    TEXT NOT NULL DEFAULT 'online',
            access    TEXT NOT NULL DEFAULT 'read-write'
        );
        CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        CREATE INDEX IF NOT EXISTS idx_labels_label ON graph_labels(label);
        "#,
    )
    .map_err(|e| GraphStoreError::schema(e.to_string()))?;
    Ok(())
}

const REQUIRED_TABLES: [&str; 4] = ["graph_entities", "graph_edges", "graph_labels", "graph_catalog"];

/// Checks that every graph table exists without touching the file.
pub fn verify_schema(conn: &Connection) -> Result<(), GraphStoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
        .map_err(|e| GraphStoreError::schema(e.to_string()))?;
    for table in REQUIRED_TABLES {
        let present = stmt
            .exists([table])
            .map_err(|e| GraphStoreError::schema(e.to_string()))?;
        if !present {
            return Err(GraphStoreError::schema(format!("missing table {table}")));
        }
    }
    Ok(())
}
