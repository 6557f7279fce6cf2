use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GraphStoreError;

/// Property bag of a node or relationship. Values keep their JSON type, so an
/// integer stays an integer across a copy.
pub type PropertyMap = Map<String, Value>;

/// A labelled node as read from a source store. `id` is scoped to that store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: i64,
    pub labels: BTreeSet<String>,
    pub properties: PropertyMap,
}

/// A typed, directed relationship between two source-scoped node ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRelationship {
    pub id: i64,
    pub start_id: i64,
    pub end_id: i64,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl GraphNode {
    pub fn new<I, S>(labels: I, properties: PropertyMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: 0,
            labels: labels.into_iter().map(Into::into).collect(),
            properties,
        }
    }
}

impl GraphRelationship {
    pub fn new<T: Into<String>>(
        start_id: i64,
        end_id: i64,
        rel_type: T,
        properties: PropertyMap,
    ) -> Self {
        Self {
            id: 0,
            start_id,
            end_id,
            rel_type: rel_type.into(),
            properties,
        }
    }
}

/// Entities that can be scanned in ascending id order.
pub trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for GraphNode {
    fn key(&self) -> i64 {
        self.id
    }
}

impl Keyed for GraphRelationship {
    fn key(&self) -> i64 {
        self.id
    }
}

pub fn validate_node(node: &GraphNode) -> Result<(), GraphStoreError> {
    if node.labels.iter().any(|label| label.trim().is_empty()) {
        return Err(GraphStoreError::invalid_input("node labels must not be blank"));
    }
    Ok(())
}

pub fn validate_relationship(rel: &GraphRelationship) -> Result<(), GraphStoreError> {
    if rel.rel_type.trim().is_empty() {
        return Err(GraphStoreError::invalid_input("relationship type must be set"));
    }
    if rel.start_id <= 0 || rel.end_id <= 0 {
        return Err(GraphStoreError::invalid_input(
            "relationship endpoints must be positive ids",
        ));
    }
    Ok(())
}

pub(crate) fn encode_properties(properties: &PropertyMap) -> Result<String, GraphStoreError> {
    serde_json::to_string(properties).map_err(|e| GraphStoreError::invalid_input(e.to_string()))
}

fn decode_properties(column: usize, data: String) -> Result<PropertyMap, rusqlite::Error> {
    serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Maps `id, data` to a node without labels; labels are attached separately.
pub(crate) fn row_to_node(row: &rusqlite::Row<'_>) -> Result<GraphNode, rusqlite::Error> {
    let data: String = row.get(1)?;
    Ok(GraphNode {
        id: row.get(0)?,
        labels: BTreeSet::new(),
        properties: decode_properties(1, data)?,
    })
}

pub(crate) fn row_to_relationship(
    row: &rusqlite::Row<'_>,
) -> Result<GraphRelationship, rusqlite::Error> {
    let data: String = row.get(4)?;
    Ok(GraphRelationship {
        id: row.get(0)?,
        start_id: row.get(1)?,
        end_id: row.get(2)?,
        rel_type: row.get(3)?,
        properties: decode_properties(4, data)?,
    })
}
