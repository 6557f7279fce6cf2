mod sqlite_graph;
mod types;

pub use sqlite_graph::{CatalogEntry, SqliteGraph};
pub use types::{
    GraphNode, GraphRelationship, Keyed, PropertyMap, validate_node, validate_relationship,
};
