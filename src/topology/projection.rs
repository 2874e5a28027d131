use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::TopologyError,
    event::LineEvent,
    eventlog::{LogRecord, StreamAppend},
    properties::{
        DirectionConvention, EndKind, JunctionId, LineId, LineKind, RouteNodeId, RouteSegmentId,
        SegmentId, WalkId,
    },
    route::RouteNetwork,
    topology::{
        index::TopologyIndex,
        junction::Junction,
        line::{Line, LineInfo, Segment, SegmentInfo},
        overlap::OverlapCache,
        relation::{self, RelationFilter, SegmentRelation},
        traversal::{self, TraversalNode},
    },
};

/// The in-memory fold of the event log: lines, the segment arena, junctions and the reverse
/// index. A projection is only ever mutated by [Projection::apply]; every other method is a
/// read, including the `plan_*` methods which validate a command and return the events it would
/// append.
#[derive(Debug, Default)]
pub struct Projection {
    direction: DirectionConvention,
    lines: BTreeMap<LineId, Line>,
    segments: BTreeMap<SegmentId, Segment>,
    junctions: BTreeMap<JunctionId, Junction>,
    index: TopologyIndex,
    overlap: Mutex<OverlapCache>,
    position: u64,
}

#[derive(Serialize)]
struct ProjectionDigest<'a> {
    position: u64,
    lines: Vec<&'a Line>,
    segments: Vec<&'a Segment>,
    junctions: Vec<&'a Junction>,
    index: &'a TopologyIndex,
}

impl Projection {
    pub fn new(direction: DirectionConvention) -> Projection {
        Projection {
            direction,
            ..Default::default()
        }
    }

    /// Fold `records` into a fresh projection.
    pub fn replay(
        direction: DirectionConvention,
        records: &[LogRecord],
        network: &dyn RouteNetwork,
    ) -> Result<Projection, TopologyError> {
        let mut projection = Projection::new(direction);
        for record in records {
            projection.apply(record, network)?;
        }
        tracing::info!(
            "Replayed {} log records into {} lines",
            records.len(),
            projection.lines.len()
        );
        Ok(projection)
    }

    pub fn direction(&self) -> DirectionConvention {
        self.direction
    }

    /// Global log position of the last applied record.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn line(&self, id: &LineId) -> Option<&Line> {
        self.lines.get(id)
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn junction(&self, id: &JunctionId) -> Option<&Junction> {
        self.junctions.get(id)
    }

    pub fn index(&self) -> &TopologyIndex {
        &self.index
    }

    pub fn overlap_cache_len(&self) -> usize {
        self.overlap.lock().len()
    }

    fn line_ref(&self, id: &LineId) -> Result<&Line, TopologyError> {
        self.lines
            .get(id)
            .ok_or_else(|| TopologyError::NotFound(format!("line {id}")))
    }

    fn segment_ref(&self, id: &SegmentId) -> Result<&Segment, TopologyError> {
        self.segments
            .get(id)
            .ok_or_else(|| TopologyError::NotFound(format!("segment {id}")))
    }

    /// The line a command addresses: `line` itself, or its inner conduit `sequence_number`.
    pub fn target_line(
        &self,
        line: &LineId,
        sequence_number: Option<u16>,
    ) -> Result<&Line, TopologyError> {
        let outer = self.line_ref(line)?;
        match sequence_number {
            None => Ok(outer),
            Some(seq) => {
                let inner = outer.inner_conduits.get(&seq).ok_or_else(|| {
                    TopologyError::NotFound(format!("inner conduit {seq} of line {line}"))
                })?;
                self.line_ref(inner)
            }
        }
    }

    /// The line owning a segment end addressed by a connect. An unknown line or inner conduit
    /// makes the end reference invalid rather than missing.
    pub fn connect_line(
        &self,
        line: &LineId,
        sequence_number: Option<u16>,
    ) -> Result<&Line, TopologyError> {
        self.target_line(line, sequence_number).map_err(|e| match e {
            TopologyError::NotFound(what) => TopologyError::InvalidArgument(format!(
                "cannot connect a segment end of {what}: no such line"
            )),
            other => other,
        })
    }

    pub fn inner_conduit(&self, line: &LineId, sequence_number: u16) -> Result<LineId, TopologyError> {
        Ok(self.target_line(line, Some(sequence_number))?.id)
    }

    /// The segment of `line` that has `point` strictly inside its span.
    fn cut_target(&self, line: &Line, point: &RouteNodeId) -> Result<SegmentId, TopologyError> {
        let walk = line.walk();
        let Some(position) = walk.position(point) else {
            return Err(TopologyError::InvalidArgument(format!(
                "route node {point} is not on the walk of line {}",
                line.id
            )));
        };
        if let Some(existing) = self.junctions.get(&JunctionId::at_route_node(*point)) {
            if existing.is_connector() {
                return Err(TopologyError::InvalidArgument(format!(
                    "junction id {} at route node {point} is already used by a connector",
                    existing.id
                )));
            }
        }
        for id in line.segments.iter() {
            let segment = self.segment_ref(id)?;
            let (Some(from), Some(to)) = (
                walk.position(&segment.from_node),
                walk.position(&segment.to_node),
            ) else {
                continue;
            };
            if from < position && position < to {
                return Ok(*id);
            }
        }
        Err(TopologyError::InvalidArgument(format!(
            "route node {point} is not strictly inside any segment of line {}",
            line.id
        )))
    }

    /// The segment whose `end` sits at `point`, checked to be free for a connector.
    fn connect_target(
        &self,
        line: &Line,
        point: &RouteNodeId,
        end: EndKind,
        junction: &JunctionId,
    ) -> Result<SegmentId, TopologyError> {
        if junction.is_nil() {
            return Err(TopologyError::InvalidArgument(
                "connector junction id must not be nil".to_string(),
            ));
        }
        if let Some(existing) = self.junctions.get(junction) {
            if !existing.is_connector() {
                return Err(TopologyError::InvalidArgument(format!(
                    "junction {junction} is a route-node junction and cannot be used as a \
                     connector"
                )));
            }
        }
        if !line.walk().contains_node(point) {
            return Err(TopologyError::InvalidArgument(format!(
                "route node {point} is not on the walk of line {}",
                line.id
            )));
        }
        for id in line.segments.iter() {
            let segment = self.segment_ref(id)?;
            if segment.node_at(end) != *point {
                continue;
            }
            if let Some(attached) = segment.junction_at(end) {
                if self
                    .junctions
                    .get(&attached)
                    .map(|j| j.is_connector())
                    .unwrap_or(false)
                {
                    return Err(TopologyError::InvalidArgument(format!(
                        "{end} end of segment {id} at {point} is already connected to {attached}"
                    )));
                }
            }
            return Ok(*id);
        }
        Err(TopologyError::InvalidArgument(format!(
            "line {} has no {end} segment end at route node {point}",
            line.id
        )))
    }

    pub fn is_cut_at(&self, line: &LineId, point: &RouteNodeId) -> Result<bool, TopologyError> {
        let line = self.line_ref(line)?;
        for id in line.segments.iter() {
            let segment = self.segment_ref(id)?;
            if segment.from_node == *point || segment.to_node == *point {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_new_line(&self, id: &LineId) -> Result<(), TopologyError> {
        if id.is_nil() {
            return Err(TopologyError::InvalidArgument(
                "line id must not be nil".to_string(),
            ));
        }
        if self.lines.contains_key(id) {
            return Err(TopologyError::DuplicateId(format!("line {id}")));
        }
        Ok(())
    }

    /// Validate a single line placement and return the event that records it.
    #[allow(clippy::too_many_arguments)]
    pub fn plan_place_line(
        &self,
        id: LineId,
        walk: WalkId,
        kind: LineKind,
        parent: Option<LineId>,
        sequence_number: Option<u16>,
        name: &str,
        network: &dyn RouteNetwork,
    ) -> Result<StreamAppend, TopologyError> {
        self.check_new_line(&id)?;

        let walk = match (kind, parent) {
            (_, None) if kind.requires_parent() => {
                return Err(TopologyError::InvalidArgument(format!(
                    "{kind} {id} requires a parent line"
                )));
            }
            (_, Some(parent)) => {
                let parent_line = self.line_ref(&parent)?;
                if !kind.allowed_parents().contains(parent_line.kind) {
                    return Err(TopologyError::InvalidArgument(format!(
                        "{kind} {id} cannot be nested in {} {parent}",
                        parent_line.kind
                    )));
                }
                if kind == LineKind::InnerConduit {
                    if !walk.is_nil() && walk != parent_line.walk_id {
                        return Err(TopologyError::InvalidArgument(format!(
                            "inner conduit {id} must follow walk {} of its parent {parent}",
                            parent_line.walk_id
                        )));
                    }
                    parent_line.walk_id
                } else {
                    network.resolve_walk(&walk)?.id
                }
            }
            (_, None) => network.resolve_walk(&walk)?.id,
        };

        match (kind, sequence_number) {
            (LineKind::InnerConduit, Some(seq)) if seq >= 1 => {
                if let Some(parent) = parent {
                    let parent_line = self.line_ref(&parent)?;
                    if let Some(existing) = parent_line.inner_conduits.get(&seq) {
                        return Err(TopologyError::InvalidArgument(format!(
                            "inner conduit {seq} of line {parent} is already placed as {existing}"
                        )));
                    }
                }
            }
            (LineKind::InnerConduit, _) => {
                return Err(TopologyError::InvalidArgument(format!(
                    "inner conduit {id} requires a sequence number of at least 1"
                )));
            }
            (_, Some(seq)) => {
                return Err(TopologyError::InvalidArgument(format!(
                    "{kind} {id} cannot carry sequence number {seq}"
                )));
            }
            (_, None) => {}
        }

        Ok(StreamAppend {
            line: id,
            expected_version: 0,
            events: vec![LineEvent::Placed {
                line: id,
                kind,
                walk,
                parent,
                sequence_number,
                name: name.to_string(),
            }],
        })
    }

    /// Validate a multi-conduit placement with `inner_count` inner conduits numbered from 1.
    pub fn plan_place_multi_conduit(
        &self,
        id: LineId,
        walk: WalkId,
        inner_count: u16,
        name: &str,
        network: &dyn RouteNetwork,
    ) -> Result<Vec<StreamAppend>, TopologyError> {
        self.check_new_line(&id)?;
        if inner_count == 0 {
            return Err(TopologyError::InvalidArgument(format!(
                "multi-conduit {id} needs at least one inner conduit"
            )));
        }
        let walk = network.resolve_walk(&walk)?.id;
        let mut batch = vec![StreamAppend {
            line: id,
            expected_version: 0,
            events: vec![LineEvent::Placed {
                line: id,
                kind: LineKind::MultiConduit,
                walk,
                parent: None,
                sequence_number: None,
                name: name.to_string(),
            }],
        }];
        for seq in 1..=inner_count {
            let inner = LineId::inner_conduit(id, seq);
            self.check_new_line(&inner)?;
            batch.push(StreamAppend {
                line: inner,
                expected_version: 0,
                events: vec![LineEvent::Placed {
                    line: inner,
                    kind: LineKind::InnerConduit,
                    walk,
                    parent: Some(id),
                    sequence_number: Some(seq),
                    name: format!("{name} #{seq}"),
                }],
            });
        }
        Ok(batch)
    }

    pub fn plan_cut(
        &self,
        line: &LineId,
        sequence_number: Option<u16>,
        point: RouteNodeId,
        expected_version: Option<u64>,
    ) -> Result<StreamAppend, TopologyError> {
        let target = self.target_line(line, sequence_number)?;
        self.cut_target(target, &point)?;
        Ok(StreamAppend {
            line: target.id,
            expected_version: expected_version.unwrap_or(target.version),
            events: vec![LineEvent::Cut {
                line: target.id,
                point,
            }],
        })
    }

    pub fn plan_connect(
        &self,
        line: &LineId,
        sequence_number: Option<u16>,
        point: RouteNodeId,
        end: EndKind,
        junction: JunctionId,
        expected_version: Option<u64>,
    ) -> Result<StreamAppend, TopologyError> {
        let target = self.connect_line(line, sequence_number)?;
        self.connect_target(target, &point, end, &junction)?;
        Ok(StreamAppend {
            line: target.id,
            expected_version: expected_version.unwrap_or(target.version),
            events: vec![LineEvent::Connected {
                line: target.id,
                point,
                end,
                junction,
            }],
        })
    }

    /// Fold one log record into the projection. Records at or below [Projection::position] are
    /// ignored.
    pub fn apply(
        &mut self,
        record: &LogRecord,
        network: &dyn RouteNetwork,
    ) -> Result<(), TopologyError> {
        if record.position <= self.position {
            tracing::debug!("Skipping already applied record {}", record.position);
            return Ok(());
        }
        let current = self.lines.get(&record.line).map(|l| l.version).unwrap_or(0);
        if record.version != current + 1 {
            return Err(TopologyError::Conflict(format!(
                "record {} moves line {} from version {current} to {}",
                record.position, record.line, record.version
            )));
        }
        tracing::debug!("[Projection::apply] {}", record.event);
        match &record.event {
            LineEvent::Placed {
                line,
                kind,
                walk,
                parent,
                sequence_number,
                name,
            } => self.apply_placed(*line, *kind, walk, *parent, *sequence_number, name, network)?,
            LineEvent::Cut { line, point } => self.apply_cut(*line, *point)?,
            LineEvent::Connected {
                line,
                point,
                end,
                junction,
            } => self.apply_connected(*line, *point, *end, *junction)?,
        }
        self.position = record.position;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_placed(
        &mut self,
        id: LineId,
        kind: LineKind,
        walk: &WalkId,
        parent: Option<LineId>,
        sequence_number: Option<u16>,
        name: &str,
        network: &dyn RouteNetwork,
    ) -> Result<(), TopologyError> {
        self.check_new_line(&id)?;
        if let Some(parent) = parent {
            self.line_ref(&parent)?;
        }
        let walk = network.resolve_walk(walk)?;
        let mut line = Line::new(id, kind, walk.clone(), parent, sequence_number, name.to_string());
        let segment = Segment::new(id, walk.start_node_id(), walk.end_node_id(), None, None);
        line.segments.push(segment.id);
        line.version = 1;
        self.index.upsert_line(id, &walk, [&segment])?;
        self.segments.insert(segment.id, segment);
        self.lines.insert(id, line);

        if let Some(parent) = parent.and_then(|p| self.lines.get_mut(&p)) {
            parent.nested.insert(id);
            if let (LineKind::InnerConduit, Some(seq)) = (kind, sequence_number) {
                parent.inner_conduits.insert(seq, id);
            }
        }
        Ok(())
    }

    fn junction_mut(&mut self, id: &JunctionId) -> Result<&mut Junction, TopologyError> {
        self.junctions
            .get_mut(id)
            .ok_or_else(|| TopologyError::NotFound(format!("junction {id}")))
    }

    fn apply_cut(&mut self, line_id: LineId, point: RouteNodeId) -> Result<(), TopologyError> {
        let target = self.cut_target(self.line_ref(&line_id)?, &point)?;
        let old = self.segment_ref(&target)?.clone();
        let junction_id = JunctionId::at_route_node(point);

        let left = Segment::new(
            line_id,
            old.from_node,
            point,
            old.from_junction,
            Some(junction_id),
        );
        let right = Segment::new(
            line_id,
            point,
            old.to_node,
            Some(junction_id),
            old.to_junction,
        );

        if let Some(j) = old.from_junction {
            let junction = self.junction_mut(&j)?;
            junction.detach(line_id, old.id, EndKind::Outgoing);
            junction.attach(line_id, left.id, EndKind::Outgoing);
        }
        if let Some(j) = old.to_junction {
            let junction = self.junction_mut(&j)?;
            junction.detach(line_id, old.id, EndKind::Incoming);
            junction.attach(line_id, right.id, EndKind::Incoming);
        }
        let junction = self
            .junctions
            .entry(junction_id)
            .or_insert_with(|| Junction::at_route_node(point));
        junction.attach(line_id, left.id, EndKind::Incoming);
        junction.attach(line_id, right.id, EndKind::Outgoing);

        self.segments.remove(&old.id);
        let (left_id, right_id) = (left.id, right.id);
        self.segments.insert(left.id, left);
        self.segments.insert(right.id, right);

        let Some(line) = self.lines.get_mut(&line_id) else {
            return Err(TopologyError::NotFound(format!("line {line_id}")));
        };
        if let Some(idx) = line.segments.iter().position(|s| *s == old.id) {
            line.segments.splice(idx..=idx, [left_id, right_id]);
        }
        line.version += 1;
        self.reindex(&line_id)
    }

    fn apply_connected(
        &mut self,
        line_id: LineId,
        point: RouteNodeId,
        end: EndKind,
        junction_id: JunctionId,
    ) -> Result<(), TopologyError> {
        let target = self.connect_target(self.line_ref(&line_id)?, &point, end, &junction_id)?;
        let previous = self.segment_ref(&target)?.junction_at(end);
        if let Some(previous) = previous {
            self.junction_mut(&previous)?.detach(line_id, target, end);
        }
        self.junctions
            .entry(junction_id)
            .or_insert_with(|| Junction::connector(junction_id))
            .attach(line_id, target, end);
        if let Some(segment) = self.segments.get_mut(&target) {
            segment.set_junction(end, Some(junction_id));
        }
        if let Some(line) = self.lines.get_mut(&line_id) {
            line.version += 1;
        }
        Ok(())
    }

    fn reindex(&mut self, line_id: &LineId) -> Result<(), TopologyError> {
        let Some(line) = self.lines.get(line_id) else {
            return Err(TopologyError::NotFound(format!("line {line_id}")));
        };
        let segments = &self.segments;
        self.index.upsert_line(
            *line_id,
            line.walk(),
            line.segments.iter().filter_map(|id| segments.get(id)),
        )
    }

    /// Overlapping segments of the parent line.
    pub fn parents_of(&self, segment: &Segment) -> Result<BTreeSet<SegmentId>, TopologyError> {
        let line = self.line_ref(&segment.line)?;
        let Some(parent_id) = line.parent else {
            return Ok(BTreeSet::new());
        };
        let parent = self.line_ref(&parent_id)?;
        let links = self
            .overlap
            .lock()
            .get_or_compute(line, parent, &self.segments)?;
        Ok(links.parents.get(&segment.id).cloned().unwrap_or_default())
    }

    /// Overlapping segments of every line nested in this segment's line.
    pub fn children_of(&self, segment: &Segment) -> Result<BTreeSet<SegmentId>, TopologyError> {
        let line = self.line_ref(&segment.line)?;
        let mut children = BTreeSet::new();
        for nested in line.nested.iter() {
            let child = self.line_ref(nested)?;
            let links = self
                .overlap
                .lock()
                .get_or_compute(child, line, &self.segments)?;
            if let Some(found) = links.children.get(&segment.id) {
                children.extend(found.iter().copied());
            }
        }
        Ok(children)
    }

    pub fn segment_info(&self, id: &SegmentId) -> Result<SegmentInfo, TopologyError> {
        let segment = self.segment_ref(id)?;
        Ok(SegmentInfo {
            id: segment.id,
            line: segment.line,
            from_node: segment.from_node,
            to_node: segment.to_node,
            from_junction: segment.from_junction,
            to_junction: segment.to_junction,
            parents: self.parents_of(segment)?,
            children: self.children_of(segment)?,
        })
    }

    /// Concatenate the walk nodes of every segment span; a shared boundary node appears once.
    fn segment_path(&self, line: &Line) -> Result<Vec<RouteNodeId>, TopologyError> {
        let mut path: Vec<RouteNodeId> = Vec::new();
        for id in line.segments.iter() {
            let segment = self.segment_ref(id)?;
            let nodes = line
                .walk()
                .sub_walk(&segment.from_node, &segment.to_node)?
                .node_ids;
            let skip = usize::from(path.last().is_some() && path.last() == nodes.first());
            path.extend_from_slice(&nodes[skip..]);
        }
        Ok(path)
    }

    pub fn line_info(&self, id: &LineId) -> Result<LineInfo, TopologyError> {
        let line = self.line_ref(id)?;
        Ok(LineInfo {
            id: line.id,
            kind: line.kind,
            walk_id: line.walk_id,
            parent: line.parent,
            sequence_number: line.sequence_number,
            name: line.name.clone(),
            version: line.version,
            segments: line
                .segments
                .iter()
                .map(|s| self.segment_info(s))
                .collect::<Result<Vec<_>, _>>()?,
            inner_conduits: line.inner_conduits.clone(),
            path: self.segment_path(line)?,
        })
    }

    /// A junction, restricted to one line's incidence when `scope` is given.
    pub fn junction_info(
        &self,
        id: &JunctionId,
        scope: Option<LineId>,
    ) -> Result<Junction, TopologyError> {
        let junction = self
            .junctions
            .get(id)
            .ok_or_else(|| TopologyError::NotFound(format!("junction {id}")))?;
        Ok(match scope {
            Some(line) => junction.scoped(line),
            None => junction.clone(),
        })
    }

    pub fn relations_at(
        &self,
        point: &RouteNodeId,
        filter: RelationFilter,
    ) -> Result<Vec<SegmentRelation>, TopologyError> {
        relation::relations_at(point, filter, self.direction, &self.index, &self.segments)
    }

    pub fn relations_on_route_segment(
        &self,
        route_segment: &RouteSegmentId,
        filter: RelationFilter,
    ) -> Result<Vec<SegmentRelation>, TopologyError> {
        relation::relations_on_route_segment(route_segment, filter, &self.index, &self.segments)
    }

    pub fn traverse(&self, start: &SegmentId) -> Result<Vec<TraversalNode>, TopologyError> {
        traversal::undirected_dfs(*start, &self.segments, &self.junctions)
    }

    /// SHA-256 over a canonical rendering of lines, segments, junctions and the index.
    pub fn fingerprint(&self) -> Result<String, TopologyError> {
        let digest = ProjectionDigest {
            position: self.position,
            lines: self.lines.values().collect(),
            segments: self.segments.values().collect(),
            junctions: self.junctions.values().collect(),
            index: &self.index,
        };
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&digest)?);
        Ok(hex::encode(hasher.finalize()))
    }
}
