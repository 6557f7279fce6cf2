use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use graphcopy::{
    CopyOptions, GraphNode, GraphRelationship, PropertyMap, SilentProgress, SqliteGraph,
    SqliteReader, SqliteWriter, transfer,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;

const LINE_SEED: u64 = 0xA17C;
const RANDOM_SEED: u64 = 0xB25F;
const SAMPLE_SIZE: usize = 10;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(800);

struct BenchCase {
    id: String,
    source: SqliteGraph,
}

fn bench_scales() -> &'static [usize] {
    &[1_000, 5_000]
}

fn build_source(nodes: usize, edges_per_node: usize, seed: u64) -> SqliteGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let graph = SqliteGraph::open_in_memory().expect("graph");
    let batch: Vec<GraphNode> = (0..nodes)
        .map(|idx| {
            let props = json!({"idx": idx, "score": rng.gen_range(0..1000)});
            GraphNode::new(["Item"], props.as_object().cloned().unwrap_or_default())
        })
        .collect();
    let ids = graph.insert_nodes(&batch).expect("nodes");
    let mut rels = Vec::with_capacity(nodes * edges_per_node);
    for (pos, &start) in ids.iter().enumerate() {
        if edges_per_node == 0 {
            if let Some(&end) = ids.get(pos + 1) {
                rels.push(GraphRelationship::new(start, end, "NEXT", PropertyMap::new()));
            }
            continue;
        }
        for _ in 0..edges_per_node {
            let end = ids[rng.gen_range(0..ids.len())];
            rels.push(GraphRelationship::new(start, end, "LINKS", PropertyMap::new()));
        }
    }
    graph.insert_relationships(&rels).expect("relationships");
    graph
}

fn bench_cases() -> Vec<BenchCase> {
    let mut cases = Vec::new();
    for &nodes in bench_scales() {
        cases.push(BenchCase {
            id: format!("line_{nodes}"),
            source: build_source(nodes, 0, LINE_SEED + nodes as u64),
        });
        cases.push(BenchCase {
            id: format!("random_{nodes}"),
            source: build_source(nodes, 3, RANDOM_SEED + nodes as u64),
        });
    }
    cases
}

fn bench_transfer_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_workers");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for case in bench_cases() {
        for workers in [1usize, 4] {
            let options = CopyOptions::builder()
                .workers(workers)
                .build()
                .expect("options");
            let id = format!("{}_w{workers}", case.id);
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter(|| {
                    let reader = SqliteReader::new(&case.source);
                    let writer = SqliteWriter::new(SqliteGraph::open_in_memory().expect("target"));
                    transfer(&reader, &writer, &options, &SilentProgress).expect("transfer")
                });
            });
        }
    }
    group.finish();
}

fn bench_transfer_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_batch_size");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let source = build_source(5_000, 2, RANDOM_SEED);
    for batch_size in [100usize, 1_000, 5_000] {
        let options = CopyOptions::builder()
            .batch_size(batch_size)
            .build()
            .expect("options");
        group.bench_function(BenchmarkId::from_parameter(batch_size), |b| {
            b.iter(|| {
                let reader = SqliteReader::new(&source);
                let writer = SqliteWriter::new(SqliteGraph::open_in_memory().expect("target"));
                transfer(&reader, &writer, &options, &SilentProgress).expect("transfer")
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = transfer_benches;
    config = Criterion::default();
    targets = bench_transfer_workers, bench_transfer_batch_size
);
criterion_main!(transfer_benches);
