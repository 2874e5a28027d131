//! Performance benchmarks for the topology engine
//!
//! These benchmarks build a street of handholes with a multi-conduit along it and measure:
//! - Atomic multi-conduit placement
//! - Cut application (segment split plus incremental reindex)
//! - Point relation queries
//! - Undirected traversal across splices
//! - Full replay from the event log
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ospnet_core::{
    config::TopologyConfig,
    properties::{EndKind, JunctionId, LineId, RouteNodeId, SegmentId, WalkId},
    route::InMemoryRouteNetwork,
    topology::TopologyStore,
};
use std::sync::Arc;

const HANDHOLES: usize = 40;
const INNER_CONDUITS: u16 = 12;

struct Street {
    network: Arc<InMemoryRouteNetwork>,
    nodes: Vec<RouteNodeId>,
    walk: WalkId,
}

// A straight street: cabinet, HANDHOLES handholes, end house
fn street() -> Street {
    let network = Arc::new(InMemoryRouteNetwork::new());
    let mut nodes = vec![network.add_node("cabinet")];
    for idx in 0..HANDHOLES {
        nodes.push(network.add_node(&format!("handhole {idx}")));
    }
    nodes.push(network.add_node("house"));
    for pair in nodes.windows(2) {
        network.add_segment(pair[0], pair[1], "").unwrap();
    }
    let walk = network.register_walk_through(&nodes).unwrap();
    Street {
        network,
        nodes,
        walk,
    }
}

// Every inner conduit cut at every other handhole
fn cut_street(street: &Street) -> (TopologyStore, LineId) {
    let store = TopologyStore::new(street.network.clone(), TopologyConfig::default()).unwrap();
    let multi = LineId::new();
    store
        .place_multi_conduit(multi, street.walk, INNER_CONDUITS, "trunk")
        .unwrap();
    for seq in 1..=INNER_CONDUITS {
        for point in street.nodes[1..=HANDHOLES].iter().step_by(2) {
            store.cut(multi, Some(seq), *point, None).unwrap();
        }
    }
    (store, multi)
}

// Benchmark: Placing a multi-conduit with its inner conduits
fn bench_place_multi_conduit(c: &mut Criterion) {
    let street = street();
    c.bench_function("place_multi_conduit", |b| {
        b.iter(|| {
            let store =
                TopologyStore::new(street.network.clone(), TopologyConfig::default()).unwrap();
            store
                .place_multi_conduit(LineId::new(), street.walk, INNER_CONDUITS, "trunk")
                .unwrap()
                .len()
        });
    });
}

// Benchmark: Cutting every inner conduit along the street
fn bench_cuts(c: &mut Criterion) {
    let street = street();
    c.bench_function("cut_inner_conduits", |b| {
        b.iter(|| cut_street(&street).0.snapshot().segment_count());
    });
}

// Benchmark: Relation queries at every handhole
fn bench_relations_at(c: &mut Criterion) {
    let street = street();
    let (store, _) = cut_street(&street);
    c.bench_function("relations_at", |b| {
        b.iter(|| {
            street
                .nodes
                .iter()
                .map(|node| store.relations_at(black_box(node), None).unwrap().len())
                .sum::<usize>()
        });
    });
}

// Benchmark: Traversal through a chain of splices
fn bench_traverse(c: &mut Criterion) {
    let street = street();
    let (store, multi) = cut_street(&street);
    // Splice every cut of inner conduit 1 back together through a connector
    let inner = store.inner_conduit(&multi, 1).unwrap();
    for point in street.nodes[1..=HANDHOLES].iter().step_by(2) {
        let splice = JunctionId::new();
        store
            .connect(inner, None, *point, EndKind::Incoming, splice, None)
            .unwrap();
        store
            .connect(inner, None, *point, EndKind::Outgoing, splice, None)
            .unwrap();
    }
    let start: SegmentId = store.get_line(&inner).unwrap().segments[0].id;

    c.bench_function("traverse_spliced_conduit", |b| {
        b.iter(|| store.traverse(black_box(&start)).unwrap().len());
    });
}

// Benchmark: Rebuilding the projection from the log
fn bench_reload(c: &mut Criterion) {
    let street = street();
    let (store, _) = cut_street(&street);
    c.bench_function("reload", |b| {
        b.iter(|| store.reload().unwrap());
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .measurement_time(std::time::Duration::from_secs(10));
    targets =
        bench_place_multi_conduit,
        bench_cuts,
        bench_relations_at,
        bench_traverse,
        bench_reload
}

criterion_main!(benches);
