//! The route network collaborator.
//!
//! The topology engine never owns the civil route graph. It consumes it through the
//! [RouteNetwork] trait: walk-of-interest resolution, sub-walk extraction and display lookups.
//! [InMemoryRouteNetwork] is the implementation used by tests, benches and the CLI; it can be
//! loaded from a TOML document (see [RouteNetworkDocument]).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::read_to_string, path::Path, sync::Arc};

use crate::{
    error::TopologyError,
    properties::{RouteNodeId, RouteSegmentId, Uuid, WalkId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNode {
    pub id: RouteNodeId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub id: RouteSegmentId,
    pub from_node: RouteNodeId,
    pub to_node: RouteNodeId,
    #[serde(default)]
    pub name: String,
}

impl RouteSegment {
    fn joins(&self, a: &RouteNodeId, b: &RouteNodeId) -> bool {
        (self.from_node == *a && self.to_node == *b) || (self.from_node == *b && self.to_node == *a)
    }
}

/// An ordered path through the route network: `node, segment, node, ..., node`.
///
/// A walk never visits the same route node twice, so every node has a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOfInterest {
    pub id: WalkId,
    node_ids: Vec<RouteNodeId>,
    segment_ids: Vec<RouteSegmentId>,
}

/// A contiguous piece of a [WalkOfInterest] between two of its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubWalk<'a> {
    pub node_ids: &'a [RouteNodeId],
    pub segment_ids: &'a [RouteSegmentId],
}

impl<'a> SubWalk<'a> {
    /// The nodes strictly between the sub-walk's two ends.
    pub fn interior_node_ids(&self) -> &'a [RouteNodeId] {
        if self.node_ids.len() < 2 {
            &[]
        } else {
            &self.node_ids[1..self.node_ids.len() - 1]
        }
    }
}

impl WalkOfInterest {
    /// Build a walk from its node and segment sequences. Structural checks only; use
    /// [InMemoryRouteNetwork::register_walk] to also verify the elements exist and connect.
    pub fn new(
        id: WalkId,
        node_ids: Vec<RouteNodeId>,
        segment_ids: Vec<RouteSegmentId>,
    ) -> Result<Self, TopologyError> {
        if node_ids.len() < 2 || segment_ids.len() + 1 != node_ids.len() {
            return Err(TopologyError::InvalidArgument(format!(
                "walk {id} must alternate nodes and segments and start and end with a node \
                 ({} nodes, {} segments)",
                node_ids.len(),
                segment_ids.len()
            )));
        }
        for (idx, node) in node_ids.iter().enumerate() {
            if node_ids[idx + 1..].contains(node) {
                return Err(TopologyError::InvalidArgument(format!(
                    "walk {id} visits route node {node} more than once"
                )));
            }
        }
        Ok(WalkOfInterest {
            id,
            node_ids,
            segment_ids,
        })
    }

    pub fn start_node_id(&self) -> RouteNodeId {
        self.node_ids[0]
    }

    pub fn end_node_id(&self) -> RouteNodeId {
        self.node_ids[self.node_ids.len() - 1]
    }

    pub fn node_ids(&self) -> &[RouteNodeId] {
        &self.node_ids
    }

    pub fn segment_ids(&self) -> &[RouteSegmentId] {
        &self.segment_ids
    }

    /// The walk as an alternating element sequence.
    pub fn ordered_element_ids(&self) -> Vec<Uuid> {
        let mut elements = Vec::with_capacity(self.node_ids.len() + self.segment_ids.len());
        for (idx, node) in self.node_ids.iter().enumerate() {
            elements.push(*node.as_uuid());
            if let Some(segment) = self.segment_ids.get(idx) {
                elements.push(*segment.as_uuid());
            }
        }
        elements
    }

    pub fn position(&self, node: &RouteNodeId) -> Option<usize> {
        self.node_ids.iter().position(|n| n == node)
    }

    pub fn contains_node(&self, node: &RouteNodeId) -> bool {
        self.position(node).is_some()
    }

    /// The piece of the walk from `from` to `to`. Both must be on the walk with `from` strictly
    /// before `to`.
    pub fn sub_walk(
        &self,
        from: &RouteNodeId,
        to: &RouteNodeId,
    ) -> Result<SubWalk<'_>, TopologyError> {
        let (Some(start), Some(end)) = (self.position(from), self.position(to)) else {
            return Err(TopologyError::InvalidArgument(format!(
                "sub-walk [{from}, {to}] is not on walk {}",
                self.id
            )));
        };
        if start >= end {
            return Err(TopologyError::InvalidArgument(format!(
                "sub-walk [{from}, {to}] is out of order on walk {}",
                self.id
            )));
        }
        Ok(SubWalk {
            node_ids: &self.node_ids[start..=end],
            segment_ids: &self.segment_ids[start..end],
        })
    }
}

/// Everything the topology engine needs from the route network.
pub trait RouteNetwork: Send + Sync {
    fn resolve_walk(&self, id: &WalkId) -> Result<Arc<WalkOfInterest>, TopologyError>;

    /// Route segment ids between two points of a walk, in walk order.
    fn sub_walk(
        &self,
        id: &WalkId,
        from: &RouteNodeId,
        to: &RouteNodeId,
    ) -> Result<Vec<RouteSegmentId>, TopologyError> {
        let walk = self.resolve_walk(id)?;
        let sub = walk.sub_walk(from, to)?;
        Ok(sub.segment_ids.to_vec())
    }

    fn route_node(&self, id: &RouteNodeId) -> Result<RouteNode, TopologyError>;

    fn route_segment(&self, id: &RouteSegmentId) -> Result<RouteSegment, TopologyError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkRecord {
    pub id: WalkId,
    /// Alternating node/segment ids, starting and ending with a node
    pub elements: Vec<Uuid>,
}

/// Serialized form of an [InMemoryRouteNetwork].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteNetworkDocument {
    #[serde(default)]
    pub nodes: Vec<RouteNode>,
    #[serde(default)]
    pub segments: Vec<RouteSegment>,
    #[serde(default)]
    pub walks: Vec<WalkRecord>,
}

#[derive(Debug, Default)]
struct RouteTables {
    nodes: BTreeMap<RouteNodeId, RouteNode>,
    segments: BTreeMap<RouteSegmentId, RouteSegment>,
    walks: BTreeMap<WalkId, Arc<WalkOfInterest>>,
}

/// A route network held in memory. Registration methods take `&self` so a network shared with
/// a [crate::topology::TopologyStore] can keep growing.
#[derive(Debug, Default)]
pub struct InMemoryRouteNetwork {
    tables: RwLock<RouteTables>,
}

impl InMemoryRouteNetwork {
    pub fn new() -> Self {
        InMemoryRouteNetwork::default()
    }

    pub fn from_document(doc: RouteNetworkDocument) -> Result<Self, TopologyError> {
        let network = InMemoryRouteNetwork::new();
        for node in doc.nodes {
            network.insert_node(node)?;
        }
        for segment in doc.segments {
            network.insert_segment(segment)?;
        }
        for walk in doc.walks {
            network.register_walk_with_id(walk.id, &walk.elements)?;
        }
        Ok(network)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        tracing::debug!("Loading route network from {:?}", path.as_ref());
        let content = read_to_string(path)?;
        let doc: RouteNetworkDocument = toml::from_str(&content)?;
        InMemoryRouteNetwork::from_document(doc)
    }

    pub fn to_document(&self) -> RouteNetworkDocument {
        let tables = self.tables.read();
        RouteNetworkDocument {
            nodes: tables.nodes.values().cloned().collect(),
            segments: tables.segments.values().cloned().collect(),
            walks: tables
                .walks
                .values()
                .map(|w| WalkRecord {
                    id: w.id,
                    elements: w.ordered_element_ids(),
                })
                .collect(),
        }
    }

    pub fn add_node(&self, name: &str) -> RouteNodeId {
        let id = RouteNodeId::new();
        self.tables.write().nodes.insert(
            id,
            RouteNode {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn insert_node(&self, node: RouteNode) -> Result<(), TopologyError> {
        let mut tables = self.tables.write();
        if tables.nodes.contains_key(&node.id) {
            return Err(TopologyError::DuplicateId(format!("route node {}", node.id)));
        }
        tables.nodes.insert(node.id, node);
        Ok(())
    }

    pub fn add_segment(
        &self,
        from: RouteNodeId,
        to: RouteNodeId,
        name: &str,
    ) -> Result<RouteSegmentId, TopologyError> {
        let id = RouteSegmentId::new();
        self.insert_segment(RouteSegment {
            id,
            from_node: from,
            to_node: to,
            name: name.to_string(),
        })?;
        Ok(id)
    }

    pub fn insert_segment(&self, segment: RouteSegment) -> Result<(), TopologyError> {
        let mut tables = self.tables.write();
        if tables.segments.contains_key(&segment.id) {
            return Err(TopologyError::DuplicateId(format!(
                "route segment {}",
                segment.id
            )));
        }
        for node in [&segment.from_node, &segment.to_node] {
            if !tables.nodes.contains_key(node) {
                return Err(TopologyError::NotFound(format!(
                    "route node {node} referenced by route segment {}",
                    segment.id
                )));
            }
        }
        if segment.from_node == segment.to_node {
            return Err(TopologyError::InvalidArgument(format!(
                "route segment {} starts and ends in the same node",
                segment.id
            )));
        }
        tables.segments.insert(segment.id, segment);
        Ok(())
    }

    /// Register a walk given as alternating node/segment ids.
    pub fn register_walk(&self, elements: &[Uuid]) -> Result<WalkId, TopologyError> {
        self.register_walk_with_id(WalkId::new(), elements)
    }

    pub fn register_walk_with_id(
        &self,
        id: WalkId,
        elements: &[Uuid],
    ) -> Result<WalkId, TopologyError> {
        if id.is_nil() {
            return Err(TopologyError::InvalidArgument(
                "walk of interest id must not be nil".to_string(),
            ));
        }
        let node_ids = elements
            .iter()
            .step_by(2)
            .map(|e| RouteNodeId::from(*e))
            .collect::<Vec<_>>();
        let segment_ids = elements
            .iter()
            .skip(1)
            .step_by(2)
            .map(|e| RouteSegmentId::from(*e))
            .collect::<Vec<_>>();
        if elements.len() % 2 == 0 {
            return Err(TopologyError::InvalidArgument(format!(
                "walk {id} must start and end with a route node"
            )));
        }
        let walk = WalkOfInterest::new(id, node_ids, segment_ids)?;

        let mut tables = self.tables.write();
        if tables.walks.contains_key(&id) {
            return Err(TopologyError::DuplicateId(format!("walk of interest {id}")));
        }
        for node in walk.node_ids() {
            if !tables.nodes.contains_key(node) {
                return Err(TopologyError::NotFound(format!(
                    "route node {node} in walk {id}"
                )));
            }
        }
        for (idx, segment_id) in walk.segment_ids().iter().enumerate() {
            let Some(segment) = tables.segments.get(segment_id) else {
                return Err(TopologyError::NotFound(format!(
                    "route segment {segment_id} in walk {id}"
                )));
            };
            let (a, b) = (&walk.node_ids()[idx], &walk.node_ids()[idx + 1]);
            if !segment.joins(a, b) {
                return Err(TopologyError::InvalidArgument(format!(
                    "route segment {segment_id} does not join {a} and {b} in walk {id}"
                )));
            }
        }
        tables.walks.insert(id, Arc::new(walk));
        Ok(id)
    }

    /// Register a walk through the given nodes, picking the route segment joining each
    /// consecutive pair.
    pub fn register_walk_through(&self, nodes: &[RouteNodeId]) -> Result<WalkId, TopologyError> {
        let mut elements = Vec::with_capacity(nodes.len() * 2);
        {
            let tables = self.tables.read();
            for (idx, node) in nodes.iter().enumerate() {
                elements.push(*node.as_uuid());
                if let Some(next) = nodes.get(idx + 1) {
                    let Some(segment) = tables.segments.values().find(|s| s.joins(node, next))
                    else {
                        return Err(TopologyError::NotFound(format!(
                            "no route segment joins {node} and {next}"
                        )));
                    };
                    elements.push(*segment.id.as_uuid());
                }
            }
        }
        self.register_walk(&elements)
    }
}

impl RouteNetwork for InMemoryRouteNetwork {
    fn resolve_walk(&self, id: &WalkId) -> Result<Arc<WalkOfInterest>, TopologyError> {
        self.tables
            .read()
            .walks
            .get(id)
            .cloned()
            .ok_or_else(|| TopologyError::NotFound(format!("walk of interest {id}")))
    }

    fn route_node(&self, id: &RouteNodeId) -> Result<RouteNode, TopologyError> {
        self.tables
            .read()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| TopologyError::NotFound(format!("route node {id}")))
    }

    fn route_segment(&self, id: &RouteSegmentId) -> Result<RouteSegment, TopologyError> {
        self.tables
            .read()
            .segments
            .get(id)
            .cloned()
            .ok_or_else(|| TopologyError::NotFound(format!("route segment {id}")))
    }
}
