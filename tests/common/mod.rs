//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use ospnet_core::{
    properties::{RouteNodeId, WalkId},
    route::InMemoryRouteNetwork,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A street cabinet feeding two houses through one handhole.
#[allow(dead_code)]
pub struct StreetNetwork {
    pub cabinet: RouteNodeId,
    pub handhole: RouteNodeId,
    pub house1: RouteNodeId,
    pub house2: RouteNodeId,
    pub trunk: WalkId,
    pub drop: WalkId,
}

/// Build the street network, write it as a TOML document into `temp_dir` and return the path.
///
/// Stores under test should load the written file, so the document format is exercised too.
#[allow(dead_code)]
pub fn write_street_network(temp_dir: &TempDir) -> (PathBuf, StreetNetwork) {
    let network = InMemoryRouteNetwork::new();
    let cabinet = network.add_node("cabinet");
    let handhole = network.add_node("handhole");
    let house1 = network.add_node("house 1");
    let house2 = network.add_node("house 2");
    network.add_segment(cabinet, handhole, "trench").unwrap();
    network.add_segment(handhole, house1, "drop 1").unwrap();
    network.add_segment(handhole, house2, "drop 2").unwrap();
    let trunk = network
        .register_walk_through(&[cabinet, handhole, house1])
        .unwrap();
    let drop = network.register_walk_through(&[handhole, house2]).unwrap();

    let path = temp_dir.path().join("network.toml");
    let content = toml::to_string(&network.to_document()).unwrap();
    std::fs::write(&path, content).unwrap();

    (
        path,
        StreetNetwork {
            cabinet,
            handhole,
            house1,
            house2,
            trunk,
            drop,
        },
    )
}
