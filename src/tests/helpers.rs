//! Shared test utilities for topology scenarios

use crate::{
    config::TopologyConfig,
    properties::{LineId, LineKind, RouteNodeId, RouteSegmentId, WalkId},
    route::InMemoryRouteNetwork,
    topology::TopologyStore,
};
use std::sync::Arc;

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A small route network:
///
/// ```text
/// cabinet1 -- junction1 -- junction2 -- sdu3
///                 |            |
///               sdu1         sdu2
/// ```
pub struct TestNetwork {
    pub network: Arc<InMemoryRouteNetwork>,
    pub cabinet1: RouteNodeId,
    pub junction1: RouteNodeId,
    pub junction2: RouteNodeId,
    pub sdu1: RouteNodeId,
    pub sdu2: RouteNodeId,
    pub sdu3: RouteNodeId,
    pub cabinet1_to_junction1: RouteSegmentId,
    pub junction1_to_junction2: RouteSegmentId,
    pub junction1_to_sdu1: RouteSegmentId,
    pub junction2_to_sdu2: RouteSegmentId,
    pub junction2_to_sdu3: RouteSegmentId,
}

impl TestNetwork {
    pub fn new() -> TestNetwork {
        init_logging();
        let network = Arc::new(InMemoryRouteNetwork::new());
        let cabinet1 = network.add_node("cabinet 1");
        let junction1 = network.add_node("junction 1");
        let junction2 = network.add_node("junction 2");
        let sdu1 = network.add_node("sdu 1");
        let sdu2 = network.add_node("sdu 2");
        let sdu3 = network.add_node("sdu 3");
        TestNetwork {
            cabinet1_to_junction1: network.add_segment(cabinet1, junction1, "").unwrap(),
            junction1_to_junction2: network.add_segment(junction1, junction2, "").unwrap(),
            junction1_to_sdu1: network.add_segment(junction1, sdu1, "").unwrap(),
            junction2_to_sdu2: network.add_segment(junction2, sdu2, "").unwrap(),
            junction2_to_sdu3: network.add_segment(junction2, sdu3, "").unwrap(),
            network,
            cabinet1,
            junction1,
            junction2,
            sdu1,
            sdu2,
            sdu3,
        }
    }

    /// Register a walk through `nodes`.
    pub fn walk(&self, nodes: &[RouteNodeId]) -> WalkId {
        self.network.register_walk_through(nodes).unwrap()
    }

    /// cabinet1 -> junction1 -> junction2 -> sdu2
    pub fn trunk_walk(&self) -> WalkId {
        self.walk(&[self.cabinet1, self.junction1, self.junction2, self.sdu2])
    }

    pub fn store(&self) -> TopologyStore {
        self.store_with(TopologyConfig::default())
    }

    pub fn store_with(&self, config: TopologyConfig) -> TopologyStore {
        TopologyStore::new(self.network.clone(), config).unwrap()
    }
}

/// Place a single conduit along `walk`.
pub fn place_single_conduit(store: &TopologyStore, walk: WalkId, name: &str) -> LineId {
    let id = LineId::new();
    store
        .place_line(id, walk, LineKind::SingleConduit, None, None, name)
        .unwrap();
    id
}

/// Place a multi-conduit with `inner` inner conduits along `walk`.
pub fn place_multi_conduit(store: &TopologyStore, walk: WalkId, inner: u16) -> LineId {
    let id = LineId::new();
    store.place_multi_conduit(id, walk, inner, "flatliner").unwrap();
    id
}
