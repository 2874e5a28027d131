use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    error::TopologyError,
    properties::{
        EndKind, JunctionId, LineId, LineKind, RouteNodeId, RouteSegmentId, SegmentId, WalkId,
    },
    route::WalkOfInterest,
};

/// A contiguous span of a [Line]'s walk between two route nodes.
///
/// `from_junction`/`to_junction` are `None` until the end is attached somewhere, either by a cut
/// (route-node junction) or a connect (connector junction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub line: LineId,
    pub from_node: RouteNodeId,
    pub to_node: RouteNodeId,
    pub from_junction: Option<JunctionId>,
    pub to_junction: Option<JunctionId>,
}

impl Segment {
    pub(crate) fn new(
        line: LineId,
        from_node: RouteNodeId,
        to_node: RouteNodeId,
        from_junction: Option<JunctionId>,
        to_junction: Option<JunctionId>,
    ) -> Segment {
        Segment {
            id: SegmentId::for_span(line, from_node, to_node),
            line,
            from_node,
            to_node,
            from_junction,
            to_junction,
        }
    }

    /// The route node at the given end.
    pub fn node_at(&self, end: EndKind) -> RouteNodeId {
        match end {
            EndKind::Incoming => self.to_node,
            EndKind::Outgoing => self.from_node,
        }
    }

    pub fn junction_at(&self, end: EndKind) -> Option<JunctionId> {
        match end {
            EndKind::Incoming => self.to_junction,
            EndKind::Outgoing => self.from_junction,
        }
    }

    pub(crate) fn set_junction(&mut self, end: EndKind, junction: Option<JunctionId>) {
        match end {
            EndKind::Incoming => self.to_junction = junction,
            EndKind::Outgoing => self.from_junction = junction,
        }
    }

    /// Route segments covered by this span, in walk order.
    pub fn route_segments<'a>(
        &self,
        walk: &'a WalkOfInterest,
    ) -> Result<&'a [RouteSegmentId], TopologyError> {
        Ok(walk.sub_walk(&self.from_node, &self.to_node)?.segment_ids)
    }
}

/// One placed line asset and its current segmentation.
#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub id: LineId,
    pub kind: LineKind,
    pub walk_id: WalkId,
    pub parent: Option<LineId>,
    pub sequence_number: Option<u16>,
    pub name: String,
    /// Number of events folded into this line
    pub version: u64,
    /// Segment ids in walk order
    pub segments: Vec<SegmentId>,
    /// Lines naming this line as their parent
    pub nested: BTreeSet<LineId>,
    /// Nested inner conduits by sequence number
    pub inner_conduits: BTreeMap<u16, LineId>,
    #[serde(skip)]
    walk: Arc<WalkOfInterest>,
}

impl Line {
    pub(crate) fn new(
        id: LineId,
        kind: LineKind,
        walk: Arc<WalkOfInterest>,
        parent: Option<LineId>,
        sequence_number: Option<u16>,
        name: String,
    ) -> Line {
        Line {
            id,
            kind,
            walk_id: walk.id,
            parent,
            sequence_number,
            name,
            version: 0,
            segments: Vec::new(),
            nested: BTreeSet::new(),
            inner_conduits: BTreeMap::new(),
            walk,
        }
    }

    pub fn walk(&self) -> &WalkOfInterest {
        &self.walk
    }
}

/// Query view of a [Segment] with its derived structural links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: SegmentId,
    pub line: LineId,
    pub from_node: RouteNodeId,
    pub to_node: RouteNodeId,
    pub from_junction: Option<JunctionId>,
    pub to_junction: Option<JunctionId>,
    /// Overlapping segments of the parent line
    pub parents: BTreeSet<SegmentId>,
    /// Overlapping segments of nested lines
    pub children: BTreeSet<SegmentId>,
}

/// Query view of a [Line].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    pub id: LineId,
    pub kind: LineKind,
    pub walk_id: WalkId,
    pub parent: Option<LineId>,
    pub sequence_number: Option<u16>,
    pub name: String,
    pub version: u64,
    pub segments: Vec<SegmentInfo>,
    pub inner_conduits: BTreeMap<u16, LineId>,
    /// Route nodes covered by the segments, each span expanded along the walk
    pub path: Vec<RouteNodeId>,
}

impl LineInfo {
    /// The route nodes visited by the line's segments, concatenated in order. For a consistent
    /// line this equals the walk's node sequence.
    pub fn reconstructed_path(&self) -> &[RouteNodeId] {
        &self.path
    }
}
