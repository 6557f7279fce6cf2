use parking_lot::{Mutex, MutexGuard};

use crate::{
    errors::{CopyError, GraphStoreError},
    graph::{GraphNode, GraphRelationship, Keyed, SqliteGraph},
    guard::{AccessMode, DatabaseAdmin, DatabaseInfo, DatabaseStatus},
    identity::{IdentityMap, NodeMapping},
    options::CopyOptions,
};

use super::{DataReader, DataWriter, NodeStream, RelationshipStream};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Reads a source [`SqliteGraph`] page by page in ascending id order.
pub struct SqliteReader<'a> {
    graph: &'a SqliteGraph,
    page_size: usize,
}

impl<'a> SqliteReader<'a> {
    pub fn new(graph: &'a SqliteGraph) -> Self {
        Self {
            graph,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn graph(&self) -> &SqliteGraph {
        self.graph
    }
}

impl DataReader for SqliteReader<'_> {
    fn read_nodes(&self) -> Result<NodeStream<'_>, CopyError> {
        let graph = self.graph;
        Ok(Box::new(PagedScan::new(self.page_size, move |after, limit| {
            graph.node_page(after, limit)
        })))
    }

    fn read_relationships(&self) -> Result<RelationshipStream<'_>, CopyError> {
        let graph = self.graph;
        Ok(Box::new(PagedScan::new(self.page_size, move |after, limit| {
            graph.relationship_page(after, limit)
        })))
    }

    fn total_node_count(&self) -> Result<u64, CopyError> {
        Ok(self.graph.node_count()?)
    }

    fn total_relationship_count(&self) -> Result<u64, CopyError> {
        Ok(self.graph.relationship_count()?)
    }
}

/// Keyset pagination over an id-ordered table: fetches `id > last` pages on
/// demand so at most one page is buffered.
struct PagedScan<T, F> {
    fetch: F,
    page_size: usize,
    after: i64,
    buffer: std::vec::IntoIter<T>,
    exhausted: bool,
}

impl<T, F> PagedScan<T, F> {
    fn new(page_size: usize, fetch: F) -> Self {
        Self {
            fetch,
            page_size,
            after: 0,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        }
    }
}

impl<T, F> Iterator for PagedScan<T, F>
where
    T: Keyed,
    F: FnMut(i64, usize) -> Result<Vec<T>, GraphStoreError>,
{
    type Item = Result<T, CopyError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                self.after = item.key();
                return Some(Ok(item));
            }
            if self.exhausted {
                return None;
            }
            match (self.fetch)(self.after, self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    if page.is_empty() {
                        return None;
                    }
                    self.buffer = page.into_iter();
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

/// Writes batches into a target [`SqliteGraph`], one transaction per batch.
/// SQLite connections are single-threaded, so concurrent batches queue on
/// the internal lock.
pub struct SqliteWriter {
    graph: Mutex<SqliteGraph>,
}

impl SqliteWriter {
    pub fn new(graph: SqliteGraph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }

    pub fn graph(&self) -> MutexGuard<'_, SqliteGraph> {
        self.graph.lock()
    }

    pub fn into_graph(self) -> SqliteGraph {
        self.graph.into_inner()
    }
}

impl DataWriter for SqliteWriter {
    fn write_nodes(
        &self,
        nodes: &[GraphNode],
        options: &CopyOptions,
    ) -> Result<Vec<NodeMapping>, CopyError> {
        let copies: Vec<GraphNode> = nodes
            .iter()
            .map(|node| GraphNode {
                id: node.id,
                labels: node.labels.clone(),
                properties: options.node_properties(node),
            })
            .collect();
        let target_ids = self.graph.lock().insert_nodes(&copies)?;
        Ok(nodes
            .iter()
            .zip(target_ids)
            .map(|(node, target)| NodeMapping::new(node.id, target))
            .collect())
    }

    fn write_relationships(
        &self,
        relationships: &[GraphRelationship],
        ids: &IdentityMap,
        options: &CopyOptions,
    ) -> Result<u64, CopyError> {
        let translated = relationships
            .iter()
            .map(|rel| -> Result<GraphRelationship, CopyError> {
                Ok(GraphRelationship {
                    id: rel.id,
                    start_id: ids.lookup(rel.start_id)?,
                    end_id: ids.lookup(rel.end_id)?,
                    rel_type: rel.rel_type.clone(),
                    properties: options.relationship_properties(rel),
                })
            })
            .collect::<Result<Vec<_>, CopyError>>()?;
        let written = self.graph.lock().insert_relationships(&translated)?;
        Ok(written.len() as u64)
    }
}

impl DatabaseAdmin for SqliteGraph {
    fn database_info(&self, name: &str) -> Result<DatabaseInfo, CopyError> {
        let entry = self
            .catalog_entry(name)?
            .ok_or_else(|| CopyError::DatabaseNotFound(name.to_string()))?;
        let access = AccessMode::parse(&entry.access).ok_or_else(|| {
            GraphStoreError::invalid_input(format!(
                "database {name} has unknown access mode {}",
                entry.access
            ))
        })?;
        Ok(DatabaseInfo {
            name: entry.name,
            status: DatabaseStatus::parse(&entry.status),
            access,
        })
    }

    fn set_access_mode(&self, name: &str, mode: AccessMode) -> Result<(), CopyError> {
        self.set_database_access(name, mode.as_str())
            .map_err(|err| match err {
                GraphStoreError::NotFound(_) => CopyError::DatabaseNotFound(name.to_string()),
                other => other.into(),
            })
    }
}
