use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::CopyError;

/// Pairs a source node id with the id the target assigned to its copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeMapping {
    pub source: i64,
    pub target: i64,
}

impl NodeMapping {
    pub fn new(source: i64, target: i64) -> Self {
        Self { source, target }
    }
}

/// Source-to-target node id table for one transfer.
///
/// Node writers insert concurrently during the node phase; relationship
/// writers look ids up concurrently once every node batch has landed.
#[derive(Default)]
pub struct IdentityMap {
    inner: RwLock<AHashMap<i64, i64>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(AHashMap::with_capacity(capacity)),
        }
    }

    pub fn insert(&self, mappings: &[NodeMapping]) {
        if mappings.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        inner.reserve(mappings.len());
        for mapping in mappings {
            inner.insert(mapping.source, mapping.target);
        }
    }

    /// Target id of `source`, or [`CopyError::MissingIdentityMapping`].
    pub fn lookup(&self, source: i64) -> Result<i64, CopyError> {
        self.inner
            .read()
            .get(&source)
            .copied()
            .ok_or_else(|| CopyError::missing_mapping(source))
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
