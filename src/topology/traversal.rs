use petgraph::{
    graphmap::UnGraphMap,
    visit::{depth_first_search, DfsEvent},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

use crate::{
    error::TopologyError,
    properties::{EndKind, JunctionId, LineId, SegmentId},
    topology::{junction::Junction, line::Segment},
};

/// A node of the undirected segment/junction graph.
///
/// A route-node junction appears once per line (`scope: Some(line)`), so traversal crosses it
/// only between segments of that line. Connector junctions are unscoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TraversalNode {
    Segment(SegmentId),
    Junction {
        id: JunctionId,
        scope: Option<LineId>,
    },
}

impl fmt::Display for TraversalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalNode::Segment(id) => write!(f, "segment {id}"),
            TraversalNode::Junction {
                id,
                scope: Some(line),
            } => write!(f, "junction {id} [{line}]"),
            TraversalNode::Junction { id, scope: None } => write!(f, "junction {id}"),
        }
    }
}

fn junction_node(junction: &Junction, segment: &Segment) -> TraversalNode {
    TraversalNode::Junction {
        id: junction.id,
        scope: if junction.is_connector() {
            None
        } else {
            Some(segment.line)
        },
    }
}

fn neighbours(
    node: &TraversalNode,
    segments: &BTreeMap<SegmentId, Segment>,
    junctions: &BTreeMap<JunctionId, Junction>,
) -> Result<Vec<TraversalNode>, TopologyError> {
    match node {
        TraversalNode::Segment(id) => {
            let segment = segments
                .get(id)
                .ok_or_else(|| TopologyError::NotFound(format!("segment {id}")))?;
            let mut found = Vec::new();
            for end in [EndKind::Outgoing, EndKind::Incoming] {
                if let Some(junction_id) = segment.junction_at(end) {
                    let junction = junctions.get(&junction_id).ok_or_else(|| {
                        TopologyError::NotFound(format!("junction {junction_id} of segment {id}"))
                    })?;
                    found.push(junction_node(junction, segment));
                }
            }
            Ok(found)
        }
        TraversalNode::Junction { id, scope } => {
            let junction = junctions
                .get(id)
                .ok_or_else(|| TopologyError::NotFound(format!("junction {id}")))?;
            Ok(junction
                .segments_in_scope(*scope)
                .into_iter()
                .map(TraversalNode::Segment)
                .collect())
        }
    }
}

/// The connected component containing `start` as an undirected graph.
pub fn component_graph(
    start: SegmentId,
    segments: &BTreeMap<SegmentId, Segment>,
    junctions: &BTreeMap<JunctionId, Junction>,
) -> Result<UnGraphMap<TraversalNode, ()>, TopologyError> {
    if !segments.contains_key(&start) {
        return Err(TopologyError::NotFound(format!("segment {start}")));
    }
    let start = TraversalNode::Segment(start);
    let mut graph = UnGraphMap::new();
    graph.add_node(start);
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in neighbours(&node, segments, junctions)? {
            graph.add_edge(node, next, ());
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    Ok(graph)
}

/// Nodes reachable from `start`, each once, in depth-first discovery order.
pub fn undirected_dfs(
    start: SegmentId,
    segments: &BTreeMap<SegmentId, Segment>,
    junctions: &BTreeMap<JunctionId, Junction>,
) -> Result<Vec<TraversalNode>, TopologyError> {
    let graph = component_graph(start, segments, junctions)?;
    let mut order = Vec::with_capacity(graph.node_count());
    depth_first_search(&graph, Some(TraversalNode::Segment(start)), |event| {
        if let DfsEvent::Discover(node, _) = event {
            order.push(node);
        }
    });
    Ok(order)
}
