use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{errors::GraphStoreError, graph::SqliteGraph};

/// Integrity summary of a target store after a copy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub orphan_relationships: u64,
    pub duplicate_relationships: u64,
    pub orphan_labels: u64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.total_nodes = self.total_nodes.max(other.total_nodes);
        self.total_relationships = self.total_relationships.max(other.total_relationships);
        self.orphan_relationships += other.orphan_relationships;
        self.duplicate_relationships += other.duplicate_relationships;
        self.orphan_labels += other.orphan_labels;
    }

    /// Duplicate relationships are informational only.
    pub fn has_issues(&self) -> bool {
        self.orphan_relationships > 0 || self.orphan_labels > 0
    }
}

/// Target integrity plus how the target totals compare with the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub target: SafetyReport,
    pub source_nodes: u64,
    pub source_relationships: u64,
}

impl VerificationReport {
    pub fn counts_match(&self) -> bool {
        self.source_nodes == self.target.total_nodes
            && self.source_relationships == self.target.total_relationships
    }

    pub fn has_issues(&self) -> bool {
        self.target.has_issues() || !self.counts_match()
    }
}

pub fn validate_referential_integrity(
    graph: &SqliteGraph,
) -> Result<SafetyReport, GraphStoreError> {
    let mut report = base_report(graph)?;
    report.orphan_relationships = query_single(
        graph,
        "SELECT COUNT(*) FROM graph_edges e \
         LEFT JOIN graph_entities src ON src.id = e.from_id \
         LEFT JOIN graph_entities dst ON dst.id = e.to_id \
         WHERE src.id IS NULL OR dst.id IS NULL",
    )?;
    Ok(report)
}

pub fn count_duplicate_relationships(graph: &SqliteGraph) -> Result<SafetyReport, GraphStoreError> {
    let mut report = base_report(graph)?;
    report.duplicate_relationships = query_single(
        graph,
        "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
             SELECT COUNT(*) AS cnt FROM graph_edges \
             GROUP BY from_id, to_id, edge_type, data \
             HAVING cnt > 1 \
         )",
    )?;
    Ok(report)
}

pub fn validate_labels(graph: &SqliteGraph) -> Result<SafetyReport, GraphStoreError> {
    let mut report = base_report(graph)?;
    report.orphan_labels = query_single(
        graph,
        "SELECT COUNT(*) FROM graph_labels l \
         LEFT JOIN graph_entities e ON e.id = l.entity_id \
         WHERE e.id IS NULL",
    )?;
    Ok(report)
}

pub fn run_safety_checks(graph: &SqliteGraph) -> Result<SafetyReport, GraphStoreError> {
    let mut report = SafetyReport::default();
    report.merge(&validate_referential_integrity(graph)?);
    report.merge(&count_duplicate_relationships(graph)?);
    report.merge(&validate_labels(graph)?);
    Ok(report)
}

/// Checks `target` and compares its totals with `source`.
pub fn verify_copy(
    source: &SqliteGraph,
    target: &SqliteGraph,
) -> Result<VerificationReport, GraphStoreError> {
    Ok(VerificationReport {
        target: run_safety_checks(target)?,
        source_nodes: source.node_count()?,
        source_relationships: source.relationship_count()?,
    })
}

fn base_report(graph: &SqliteGraph) -> Result<SafetyReport, GraphStoreError> {
    Ok(SafetyReport {
        total_nodes: graph.node_count()?,
        total_relationships: graph.relationship_count()?,
        ..SafetyReport::default()
    })
}

fn query_single(graph: &SqliteGraph, sql: &str) -> Result<u64, GraphStoreError> {
    graph
        .connection()
        .query_row(sql, [], |row| row.get::<_, i64>(0))
        .optional()
        .map(|opt| opt.unwrap_or(0).max(0) as u64)
        .map_err(|e| GraphStoreError::query(e.to_string()))
}
