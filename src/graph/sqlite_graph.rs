use std::path::Path;

use ahash::AHashMap;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::{
    errors::GraphStoreError,
    schema::{ensure_schema, verify_schema},
};

use super::types::{
    GraphNode, GraphRelationship, encode_properties, row_to_node, row_to_relationship,
    validate_node, validate_relationship,
};

/// Row of `graph_catalog`: the logical database hosted by a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub status: String,
    pub access: String,
}

/// Embedded SQLite-backed graph store holding nodes, labels and relationships.
pub struct SqliteGraph {
    conn: Connection,
}

impl SqliteGraph {
    /// Opens the store at `path`, creating the file and schema when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GraphStoreError> {
        let conn =
            Connection::open(path).map_err(|e| GraphStoreError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens a store that must already exist on disk with its schema in place.
    /// The file is not modified.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self, GraphStoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| GraphStoreError::connection(format!("{}: {e}", path.display())))?;
        verify_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, GraphStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GraphStoreError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts a node with its labels and returns the new rowid. `node.id` is ignored.
    pub fn insert_node(&self, node: &GraphNode) -> Result<i64, GraphStoreError> {
        self.insert_nodes(std::slice::from_ref(node))?
            .pop()
            .ok_or_else(|| GraphStoreError::query("node insert returned no id"))
    }

    /// Inserts all nodes in a single transaction; returned ids follow input order.
    pub fn insert_nodes(&self, nodes: &[GraphNode]) -> Result<Vec<i64>, GraphStoreError> {
        self.ensure_writable()?;
        for node in nodes {
            validate_node(node)?;
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let mut ids = Vec::with_capacity(nodes.len());
        {
            let mut insert_entity = tx
                .prepare_cached("INSERT INTO graph_entities(data) VALUES(?1)")
                .map_err(|e| GraphStoreError::query(e.to_string()))?;
            let mut insert_label = tx
                .prepare_cached("INSERT OR IGNORE INTO graph_labels(entity_id, label) VALUES(?1, ?2)")
                .map_err(|e| GraphStoreError::query(e.to_string()))?;
            for node in nodes {
                let data = encode_properties(&node.properties)?;
                insert_entity
                    .execute(params![data])
                    .map_err(|e| GraphStoreError::query(e.to_string()))?;
                let id = tx.last_insert_rowid();
                for label in &node.labels {
                    insert_label
                        .execute(params![id, label.as_str()])
                        .map_err(|e| GraphStoreError::query(e.to_string()))?;
                }
                ids.push(id);
            }
        }
        tx.commit()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        Ok(ids)
    }

    /// Inserts a relationship between two existing nodes. `rel.id` is ignored.
    pub fn insert_relationship(&self, rel: &GraphRelationship) -> Result<i64, GraphStoreError> {
        self.insert_relationships(std::slice::from_ref(rel))?
            .pop()
            .ok_or_else(|| GraphStoreError::query("relationship insert returned no id"))
    }

    /// Inserts all relationships in a single transaction. Endpoints are store ids.
    pub fn insert_relationships(
        &self,
        rels: &[GraphRelationship],
    ) -> Result<Vec<i64>, GraphStoreError> {
        self.ensure_writable()?;
        for rel in rels {
            validate_relationship(rel)?;
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let mut ids = Vec::with_capacity(rels.len());
        {
            let mut insert_edge = tx
                .prepare_cached(
                    "INSERT INTO graph_edges(from_id, to_id, edge_type, data) VALUES(?1, ?2, ?3, ?4)",
                )
                .map_err(|e| GraphStoreError::query(e.to_string()))?;
            for rel in rels {
                if !self.node_exists(rel.start_id)? || !self.node_exists(rel.end_id)? {
                    return Err(GraphStoreError::invalid_input(format!(
                        "relationship endpoints {} -> {} must reference existing nodes",
                        rel.start_id, rel.end_id
                    )));
                }
                let data = encode_properties(&rel.properties)?;
                insert_edge
                    .execute(params![rel.start_id, rel.end_id, rel.rel_type.as_str(), data])
                    .map_err(|e| GraphStoreError::query(e.to_string()))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        Ok(ids)
    }

    pub fn get_node(&self, id: i64) -> Result<GraphNode, GraphStoreError> {
        let mut node = self
            .conn
            .query_row(
                "SELECT id, data FROM graph_entities WHERE id=?1",
                params![id],
                row_to_node,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphStoreError::not_found(format!("node {id}"))
                }
                other => GraphStoreError::query(other.to_string()),
            })?;
        node.labels = self.labels_of(id)?.into_iter().collect();
        Ok(node)
    }

    pub fn get_relationship(&self, id: i64) -> Result<GraphRelationship, GraphStoreError> {
        self.conn
            .query_row(
                "SELECT id, from_id, to_id, edge_type, data FROM graph_edges WHERE id=?1",
                params![id],
                row_to_relationship,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphStoreError::not_found(format!("relationship {id}"))
                }
                other => GraphStoreError::query(other.to_string()),
            })
    }

    pub fn node_count(&self) -> Result<u64, GraphStoreError> {
        self.count("SELECT COUNT(*) FROM graph_entities")
    }

    pub fn relationship_count(&self) -> Result<u64, GraphStoreError> {
        self.count("SELECT COUNT(*) FROM graph_edges")
    }

    /// Up to `limit` nodes with an id greater than `after`, in ascending id order.
    pub fn node_page(&self, after: i64, limit: usize) -> Result<Vec<GraphNode>, GraphStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, data FROM graph_entities WHERE id > ?1 ORDER BY id LIMIT ?2")
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![after, page_limit(limit)], row_to_node)
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row.map_err(|e| GraphStoreError::query(e.to_string()))?);
        }
        self.attach_labels(&mut nodes)?;
        Ok(nodes)
    }

    /// Up to `limit` relationships with an id greater than `after`, in ascending id order.
    pub fn relationship_page(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<GraphRelationship>, GraphStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, from_id, to_id, edge_type, data FROM graph_edges \
                 WHERE id > ?1 ORDER BY id LIMIT ?2",
            )
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![after, page_limit(limit)], row_to_relationship)
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let mut rels = Vec::new();
        for row in rows {
            rels.push(row.map_err(|e| GraphStoreError::query(e.to_string()))?);
        }
        Ok(rels)
    }

    pub fn list_nodes(&self) -> Result<Vec<GraphNode>, GraphStoreError> {
        self.node_page(0, usize::MAX)
    }

    pub fn list_relationships(&self) -> Result<Vec<GraphRelationship>, GraphStoreError> {
        self.relationship_page(0, usize::MAX)
    }
}

impl SqliteGraph {
    /// Adds `name` to the catalog as an online, read-write database if absent.
    pub fn register_database(&self, name: &str) -> Result<(), GraphStoreError> {
        if name.trim().is_empty() {
            return Err(GraphStoreError::invalid_input("database name must be set"));
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO graph_catalog(name) VALUES(?1)",
                params![name],
            )
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        Ok(())
    }

    pub fn catalog_entry(&self, name: &str) -> Result<Option<CatalogEntry>, GraphStoreError> {
        self.conn
            .query_row(
                "SELECT name, status, access FROM graph_catalog WHERE name=?1",
                params![name],
                |row| {
                    Ok(CatalogEntry {
                        name: row.get(0)?,
                        status: row.get(1)?,
                        access: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| GraphStoreError::query(e.to_string()))
    }

    pub fn set_database_access(&self, name: &str, access: &str) -> Result<(), GraphStoreError> {
        self.update_catalog("UPDATE graph_catalog SET access=?1 WHERE name=?2", name, access)
    }

    pub fn set_database_status(&self, name: &str, status: &str) -> Result<(), GraphStoreError> {
        self.update_catalog("UPDATE graph_catalog SET status=?1 WHERE name=?2", name, status)
    }

    /// Fails with [`GraphStoreError::ReadOnly`] while any hosted database is
    /// read-only or not online.
    pub fn ensure_writable(&self) -> Result<(), GraphStoreError> {
        let blocked: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM graph_catalog \
                 WHERE status <> 'online' OR access <> 'read-write' ORDER BY name LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        match blocked {
            Some(name) => Err(GraphStoreError::read_only(name)),
            None => Ok(()),
        }
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn update_catalog(&self, sql: &str, name: &str, value: &str) -> Result<(), GraphStoreError> {
        let affected = self
            .conn
            .execute(sql, params![value, name])
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        if affected == 0 {
            return Err(GraphStoreError::not_found(format!("database {name}")));
        }
        Ok(())
    }

    fn labels_of(&self, id: i64) -> Result<Vec<String>, GraphStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label FROM graph_labels WHERE entity_id=?1 ORDER BY label")
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![id], |row| row.get(0))
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let mut labels = Vec::new();
        for label in rows {
            labels.push(label.map_err(|e| GraphStoreError::query(e.to_string()))?);
        }
        Ok(labels)
    }

    fn attach_labels(&self, nodes: &mut [GraphNode]) -> Result<(), GraphStoreError> {
        let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
            return Ok(());
        };
        let (low, high) = (first.id, last.id);
        let positions: AHashMap<i64, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id, idx))
            .collect();
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT entity_id, label FROM graph_labels \
                 WHERE entity_id BETWEEN ?1 AND ?2 ORDER BY entity_id, label",
            )
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![low, high], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        for row in rows {
            let (entity_id, label) = row.map_err(|e| GraphStoreError::query(e.to_string()))?;
            if let Some(&idx) = positions.get(&entity_id) {
                nodes[idx].labels.insert(label);
            }
        }
        Ok(())
    }

    fn node_exists(&self, id: i64) -> Result<bool, GraphStoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM graph_entities WHERE id=?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        Ok(exists.is_some())
    }

    fn count(&self, sql: &str) -> Result<u64, GraphStoreError> {
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| GraphStoreError::query(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

fn page_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
