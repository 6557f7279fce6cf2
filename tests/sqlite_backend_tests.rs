use graphcopy::{
    backend::{DataReader, DataWriter, SqliteReader, SqliteWriter},
    errors::{CopyError, GraphStoreError},
    graph::{GraphNode, GraphRelationship, PropertyMap, SqliteGraph},
    identity::{IdentityMap, NodeMapping},
    options::CopyOptions,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn props(value: Value) -> PropertyMap {
    match value {
        Value::Object(map) => map,
        _ => PropertyMap::new(),
    }
}

fn populated(count: usize) -> SqliteGraph {
    let graph = SqliteGraph::open_in_memory().expect("graph");
    let nodes: Vec<GraphNode> = (0..count)
        .map(|idx| GraphNode::new(["Item"], props(json!({"idx": idx}))))
        .collect();
    let ids = graph.insert_nodes(&nodes).expect("nodes");
    let rels: Vec<GraphRelationship> = ids
        .windows(2)
        .map(|pair| GraphRelationship::new(pair[0], pair[1], "NEXT", PropertyMap::new()))
        .collect();
    graph.insert_relationships(&rels).expect("relationships");
    graph
}

#[test]
fn test_node_round_trip_keeps_labels_and_properties() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let id = graph
        .insert_node(&GraphNode::new(
            ["Person", "Admin"],
            props(json!({"name": "Ada", "age": 36, "tags": ["a", "b"]})),
        ))
        .unwrap();
    let node = graph.get_node(id).unwrap();
    assert_eq!(node.id, id);
    assert_eq!(
        node.labels.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["Admin", "Person"]
    );
    assert_eq!(node.properties.get("age"), Some(&json!(36)));
    assert_eq!(node.properties.get("tags"), Some(&json!(["a", "b"])));
}

#[test]
fn test_relationship_requires_existing_endpoints() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let a = graph.insert_node(&GraphNode::new(["A"], PropertyMap::new())).unwrap();
    let err = graph
        .insert_relationship(&GraphRelationship::new(a, a + 10, "TO", PropertyMap::new()))
        .unwrap_err();
    assert!(matches!(err, GraphStoreError::InvalidInput(_)));
    assert_eq!(graph.relationship_count().unwrap(), 0);
    let self_loop = graph
        .insert_relationship(&GraphRelationship::new(a, a, "SELF", PropertyMap::new()))
        .unwrap();
    assert_eq!(graph.get_relationship(self_loop).unwrap().start_id, a);
}

#[test]
fn test_invalid_entities_are_rejected() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let err = graph
        .insert_node(&GraphNode::new([" "], PropertyMap::new()))
        .unwrap_err();
    assert!(matches!(err, GraphStoreError::InvalidInput(_)));
    let err = graph
        .insert_relationship(&GraphRelationship::new(1, 2, "", PropertyMap::new()))
        .unwrap_err();
    assert!(matches!(err, GraphStoreError::InvalidInput(_)));
    assert!(matches!(
        graph.get_node(77).unwrap_err(),
        GraphStoreError::NotFound(_)
    ));
}

#[test]
fn test_reader_pages_every_entity_once() {
    let graph = populated(23);
    let reader = SqliteReader::new(&graph).with_page_size(5);
    let nodes: Vec<GraphNode> = reader
        .read_nodes()
        .unwrap()
        .collect::<Result<_, CopyError>>()
        .unwrap();
    assert_eq!(nodes.len(), 23);
    assert!(nodes.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert!(nodes.iter().all(|node| node.labels.contains("Item")));
    let rels: Vec<GraphRelationship> = reader
        .read_relationships()
        .unwrap()
        .collect::<Result<_, CopyError>>()
        .unwrap();
    assert_eq!(rels.len(), 22);
    assert_eq!(reader.total_node_count().unwrap(), 23);
    assert_eq!(reader.total_relationship_count().unwrap(), 22);
}

#[test]
fn test_reader_handles_exact_page_multiple() {
    let graph = populated(10);
    let reader = SqliteReader::new(&graph).with_page_size(5);
    assert_eq!(reader.read_nodes().unwrap().count(), 10);
    let reader = SqliteReader::new(&graph).with_page_size(0);
    assert_eq!(reader.read_nodes().unwrap().count(), 10);
}

#[test]
fn test_reader_on_empty_store() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let reader = SqliteReader::new(&graph);
    assert_eq!(reader.read_nodes().unwrap().count(), 0);
    assert_eq!(reader.read_relationships().unwrap().count(), 0);
    assert_eq!(reader.total_node_count().unwrap(), 0);
}

#[test]
fn test_writer_filters_and_maps_nodes() {
    let writer = SqliteWriter::new(SqliteGraph::open_in_memory().unwrap());
    let options = CopyOptions::builder()
        .exclude_node_properties(["secret"])
        .build()
        .unwrap();
    let batch = vec![
        GraphNode {
            id: 41,
            labels: ["User".to_string()].into(),
            properties: props(json!({"name": "a", "secret": "x"})),
        },
        GraphNode {
            id: 42,
            labels: ["User".to_string()].into(),
            properties: props(json!({"name": "b"})),
        },
    ];
    let mappings = writer.write_nodes(&batch, &options).unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].source, 41);
    assert_eq!(mappings[1].source, 42);
    let graph = writer.graph();
    let first = graph.get_node(mappings[0].target).unwrap();
    assert_eq!(first.properties, props(json!({"name": "a"})));
}

#[test]
fn test_writer_resolves_relationship_endpoints() {
    let writer = SqliteWriter::new(SqliteGraph::open_in_memory().unwrap());
    let options = CopyOptions::builder()
        .exclude_relationship_properties(["since"])
        .build()
        .unwrap();
    let mappings = writer
        .write_nodes(
            &[
                GraphNode {
                    id: 7,
                    ..GraphNode::default()
                },
                GraphNode {
                    id: 9,
                    ..GraphNode::default()
                },
            ],
            &options,
        )
        .unwrap();
    let ids = IdentityMap::new();
    ids.insert(&mappings);
    let rel = GraphRelationship {
        id: 3,
        start_id: 7,
        end_id: 9,
        rel_type: "KNOWS".into(),
        properties: props(json!({"since": 2001, "weight": 2})),
    };
    assert_eq!(writer.write_relationships(&[rel], &ids, &options).unwrap(), 1);
    let graph = writer.into_graph();
    let stored = graph.list_relationships().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].start_id, ids.lookup(7).unwrap());
    assert_eq!(stored[0].end_id, ids.lookup(9).unwrap());
    assert_eq!(stored[0].properties, props(json!({"weight": 2})));
}

#[test]
fn test_writer_refuses_unmapped_endpoint_before_writing() {
    let writer = SqliteWriter::new(SqliteGraph::open_in_memory().unwrap());
    let ids = IdentityMap::new();
    ids.insert(&[NodeMapping::new(1, 1)]);
    let rels = vec![
        GraphRelationship {
            id: 1,
            start_id: 1,
            end_id: 1,
            rel_type: "OK".into(),
            properties: PropertyMap::new(),
        },
        GraphRelationship {
            id: 2,
            start_id: 1,
            end_id: 5,
            rel_type: "BROKEN".into(),
            properties: PropertyMap::new(),
        },
    ];
    let err = writer
        .write_relationships(&rels, &ids, &CopyOptions::default())
        .unwrap_err();
    assert!(matches!(err, CopyError::MissingIdentityMapping { source_id: 5 }));
    assert_eq!(writer.graph().relationship_count().unwrap(), 0);
}

#[test]
fn test_read_only_catalog_blocks_writes() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    graph.register_database("graph").unwrap();
    graph.set_database_access("graph", "read-only").unwrap();
    let err = graph
        .insert_node(&GraphNode::new(["A"], PropertyMap::new()))
        .unwrap_err();
    assert!(matches!(err, GraphStoreError::ReadOnly(name) if name == "graph"));
    assert_eq!(graph.node_count().unwrap(), 0);
    graph.set_database_access("graph", "read-write").unwrap();
    graph.set_database_status("graph", "offline").unwrap();
    assert!(graph.ensure_writable().is_err());
    graph.set_database_status("graph", "online").unwrap();
    graph.insert_node(&GraphNode::new(["A"], PropertyMap::new())).unwrap();
}

#[test]
fn test_catalog_registration() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    assert!(graph.catalog_entry("graph").unwrap().is_none());
    graph.register_database("graph").unwrap();
    graph.register_database("graph").unwrap();
    let entry = graph.catalog_entry("graph").unwrap().unwrap();
    assert_eq!(entry.status, "online");
    assert_eq!(entry.access, "read-write");
    assert!(graph.register_database("  ").is_err());
    assert!(matches!(
        graph.set_database_access("other", "read-only"),
        Err(GraphStoreError::NotFound(_))
    ));
}

#[test]
fn test_open_existing_requires_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.db");
    assert!(matches!(
        SqliteGraph::open_existing(&missing),
        Err(GraphStoreError::ConnectionError(_))
    ));
    let path = dir.path().join("present.db");
    {
        let graph = SqliteGraph::open(&path).unwrap();
        graph.insert_node(&GraphNode::new(["A"], PropertyMap::new())).unwrap();
    }
    let reopened = SqliteGraph::open_existing(&path).unwrap();
    assert_eq!(reopened.node_count().unwrap(), 1);
}

#[test]
fn test_open_existing_leaves_incomplete_store_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE graph_entities (id INTEGER PRIMARY KEY, data TEXT);")
            .unwrap();
    }
    assert!(matches!(
        SqliteGraph::open_existing(&path),
        Err(GraphStoreError::SchemaError(_))
    ));
    let conn = rusqlite::Connection::open(&path).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'graph_%'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}
