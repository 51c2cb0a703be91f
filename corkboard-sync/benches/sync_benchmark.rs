use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use corkboard_sync::graph::GraphState;
use corkboard_sync::node::Node;
use corkboard_sync::session::SessionRegistry;
use corkboard_sync::storage::NodeStore;

fn node(id: i64) -> Node {
    Node {
        id,
        x: id as f64,
        y: id as f64,
        width: 120.0,
        height: 60.0,
        text: format!("node {id}"),
        kind: None,
    }
}

fn bench_apply_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let graph = GraphState::new((1..=1_000).map(node).collect());
    let batch: Vec<Node> = (1..=100).map(node).collect();

    c.bench_function("apply_100_of_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(graph.apply(black_box(batch.clone())).await);
            })
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let graph = GraphState::new((1..=1_000).map(node).collect());

    c.bench_function("snapshot_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(graph.snapshot_with_version().await);
            })
        })
    });
}

fn bench_resolve_committed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(NodeStore::open_in_memory().unwrap());
    let registry = SessionRegistry::new(store);

    c.bench_function("resolve_committed_id", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(registry.resolve("bench", black_box(node(42))).await.unwrap());
            })
        })
    });
}

fn bench_resolve_known_placeholder(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(NodeStore::open_in_memory().unwrap());
    let registry = SessionRegistry::new(store);
    // First resolution assigns the row; the benched path is the map hit.
    rt.block_on(async {
        registry.resolve("bench", node(-1)).await.unwrap();
    });

    c.bench_function("resolve_known_placeholder", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(registry.resolve("bench", black_box(node(-1))).await.unwrap());
            })
        })
    });
}

criterion_group!(
    benches,
    bench_apply_batch,
    bench_snapshot,
    bench_resolve_committed,
    bench_resolve_known_placeholder
);
criterion_main!(benches);
