//! Per-transfer configuration and property filtering.

use ahash::AHashSet;

use crate::{
    errors::CopyError,
    graph::{GraphNode, GraphRelationship, PropertyMap},
};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_WRITER_CONCURRENCY: usize = 4;

/// Immutable settings shared read-only by every stage of one transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyOptions {
    excluded_node_properties: AHashSet<String>,
    excluded_relationship_properties: AHashSet<String>,
    batch_size: usize,
    node_workers: usize,
    relationship_workers: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            excluded_node_properties: AHashSet::new(),
            excluded_relationship_properties: AHashSet::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            node_workers: DEFAULT_WRITER_CONCURRENCY,
            relationship_workers: DEFAULT_WRITER_CONCURRENCY,
        }
    }
}

impl CopyOptions {
    pub fn builder() -> CopyOptionsBuilder {
        CopyOptionsBuilder::default()
    }

    pub fn excluded_node_properties(&self) -> &AHashSet<String> {
        &self.excluded_node_properties
    }

    pub fn excluded_relationship_properties(&self) -> &AHashSet<String> {
        &self.excluded_relationship_properties
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn node_workers(&self) -> usize {
        self.node_workers
    }

    pub fn relationship_workers(&self) -> usize {
        self.relationship_workers
    }

    /// Properties of `node` that survive the node exclusion set.
    pub fn node_properties(&self, node: &GraphNode) -> PropertyMap {
        filter_properties(&node.properties, &self.excluded_node_properties)
    }

    /// Properties of `rel` that survive the relationship exclusion set.
    pub fn relationship_properties(&self, rel: &GraphRelationship) -> PropertyMap {
        filter_properties(&rel.properties, &self.excluded_relationship_properties)
    }
}

/// Builder for [`CopyOptions`]. Unset fields keep the defaults.
#[derive(Clone, Debug, Default)]
pub struct CopyOptionsBuilder {
    excluded_node_properties: AHashSet<String>,
    excluded_relationship_properties: AHashSet<String>,
    batch_size: Option<usize>,
    node_workers: Option<usize>,
    relationship_workers: Option<usize>,
}

impl CopyOptionsBuilder {
    pub fn exclude_node_properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_node_properties = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_relationship_properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_relationship_properties = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the worker width of both phases.
    pub fn workers(mut self, workers: usize) -> Self {
        self.node_workers = Some(workers);
        self.relationship_workers = Some(workers);
        self
    }

    pub fn relationship_workers(mut self, workers: usize) -> Self {
        self.relationship_workers = Some(workers);
        self
    }

    pub fn build(self) -> Result<CopyOptions, CopyError> {
        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let node_workers = self.node_workers.unwrap_or(DEFAULT_WRITER_CONCURRENCY);
        let relationship_workers = self.relationship_workers.unwrap_or(node_workers);
        if batch_size == 0 {
            return Err(CopyError::InvalidOptions("batch size must be positive".into()));
        }
        if node_workers == 0 || relationship_workers == 0 {
            return Err(CopyError::InvalidOptions(
                "writer concurrency must be positive".into(),
            ));
        }
        Ok(CopyOptions {
            excluded_node_properties: self.excluded_node_properties,
            excluded_relationship_properties: self.excluded_relationship_properties,
            batch_size,
            node_workers,
            relationship_workers,
        })
    }
}

/// Returns the entries of `properties` whose key is not in `excluded`.
pub fn filter_properties(properties: &PropertyMap, excluded: &AHashSet<String>) -> PropertyMap {
    if excluded.is_empty() {
        return properties.clone();
    }
    properties
        .iter()
        .filter(|(key, _)| !excluded.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Splits a comma-separated key list, dropping blanks and surrounding whitespace.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
