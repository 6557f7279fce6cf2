//! Reader and writer seams between the transfer pipeline and a concrete store.
//! The pipeline only talks to [`DataReader`] and [`DataWriter`]; [`sqlite`]
//! provides the implementations over [`crate::graph::SqliteGraph`].

pub mod sqlite;

use crate::{
    errors::CopyError,
    graph::{GraphNode, GraphRelationship},
    identity::{IdentityMap, NodeMapping},
    options::CopyOptions,
};

pub use sqlite::{SqliteReader, SqliteWriter};

/// Lazy, finite, single-pass sequence of source nodes.
pub type NodeStream<'a> = Box<dyn Iterator<Item = Result<GraphNode, CopyError>> + 'a>;

/// Lazy, finite, single-pass sequence of source relationships.
pub type RelationshipStream<'a> =
    Box<dyn Iterator<Item = Result<GraphRelationship, CopyError>> + 'a>;

/// Source side of a transfer. Each stream is consumed exactly once.
pub trait DataReader {
    fn read_nodes(&self) -> Result<NodeStream<'_>, CopyError>;
    fn read_relationships(&self) -> Result<RelationshipStream<'_>, CopyError>;
    fn total_node_count(&self) -> Result<u64, CopyError>;
    fn total_relationship_count(&self) -> Result<u64, CopyError>;
}

/// Target side of a transfer. Batches arrive from several worker threads at
/// once; implementations apply the property exclusions in `options` before
/// persisting anything.
pub trait DataWriter: Sync {
    /// Creates `nodes` and returns one mapping per created node.
    fn write_nodes(
        &self,
        nodes: &[GraphNode],
        options: &CopyOptions,
    ) -> Result<Vec<NodeMapping>, CopyError>;

    /// Creates `relationships` with endpoints resolved through `ids` and
    /// returns how many were written.
    fn write_relationships(
        &self,
        relationships: &[GraphRelationship],
        ids: &IdentityMap,
        options: &CopyOptions,
    ) -> Result<u64, CopyError>;
}

impl<R> DataReader for &R
where
    R: DataReader + ?Sized,
{
    fn read_nodes(&self) -> Result<NodeStream<'_>, CopyError> {
        (*self).read_nodes()
    }

    fn read_relationships(&self) -> Result<RelationshipStream<'_>, CopyError> {
        (*self).read_relationships()
    }

    fn total_node_count(&self) -> Result<u64, CopyError> {
        (*self).total_node_count()
    }

    fn total_relationship_count(&self) -> Result<u64, CopyError> {
        (*self).total_relationship_count()
    }
}

impl<W> DataWriter for &W
where
    W: DataWriter + ?Sized,
{
    fn write_nodes(
        &self,
        nodes: &[GraphNode],
        options: &CopyOptions,
    ) -> Result<Vec<NodeMapping>, CopyError> {
        (*self).write_nodes(nodes, options)
    }

    fn write_relationships(
        &self,
        relationships: &[GraphRelationship],
        ids: &IdentityMap,
        options: &CopyOptions,
    ) -> Result<u64, CopyError> {
        (*self).write_relationships(relationships, ids, options)
    }
}
