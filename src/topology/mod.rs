//! Topology module: lines, segments and junctions overlaid on the route network.
//!
//! # Module Organization
//!
//! - [`line`]: Lines, the segment arena entries and their query views
//! - [`junction`]: Route-node and connector junctions with per-line incidence
//! - [`index`]: Reverse indices from route nodes and route segments to segments
//! - [`overlap`]: Derived parent/child links between nested lines
//! - [`relation`]: Incoming/Outgoing/PassThrough classification
//! - [`traversal`]: Undirected reachability over segments and junctions
//! - [`projection`]: The fold of the event log into all of the above
//! - [`store`]: [`TopologyStore`], the command and query entry point
//!
//! ```rust
//! use std::sync::Arc;
//! use ospnet_core::{
//!     config::TopologyConfig,
//!     properties::{LineId, LineKind},
//!     route::InMemoryRouteNetwork,
//!     topology::TopologyStore,
//! };
//!
//! let network = Arc::new(InMemoryRouteNetwork::new());
//! let a = network.add_node("A");
//! let b = network.add_node("B");
//! let c = network.add_node("C");
//! network.add_segment(a, b, "").unwrap();
//! network.add_segment(b, c, "").unwrap();
//! let walk = network.register_walk_through(&[a, b, c]).unwrap();
//!
//! let store = TopologyStore::new(network, TopologyConfig::default()).unwrap();
//! let line = LineId::new();
//! store.place_line(line, walk, LineKind::SingleConduit, None, None, "conduit").unwrap();
//! store.cut(line, None, b, None).unwrap();
//! assert_eq!(store.get_line(&line).unwrap().segments.len(), 2);
//! ```

pub mod index;
pub mod junction;
pub mod line;
pub mod overlap;
pub mod projection;
pub mod relation;
pub mod store;
pub mod traversal;


pub use index::TopologyIndex;
pub use junction::{Incidence, Junction};
pub use line::{Line, LineInfo, Segment, SegmentInfo};
pub use overlap::{OverlapKey, OverlapLinks};
pub use projection::Projection;
pub use relation::{RelationFilter, SegmentRelation};
pub use store::TopologyStore;
pub use traversal::TraversalNode;
