use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{
    error::TopologyError,
    properties::{
        DirectionConvention, LineId, RelationKind, RouteNodeId, RouteSegmentId, SegmentId, Uuid,
    },
    topology::{index::TopologyIndex, line::Segment},
};

/// How one segment relates to a point of interest or route segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentRelation {
    pub segment: SegmentId,
    pub line: LineId,
    pub kind: RelationKind,
}

impl fmt::Display for SegmentRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.segment, self.line)
    }
}

/// Restricts relation queries to the entries whose segment id or line id matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter(pub Option<Uuid>);

impl RelationFilter {
    pub fn any() -> Self {
        RelationFilter(None)
    }

    pub fn matching<I: Into<Uuid>>(id: I) -> Self {
        RelationFilter(Some(id.into()))
    }

    pub fn accepts(&self, segment: &Segment) -> bool {
        match &self.0 {
            None => true,
            Some(id) => segment.id.as_uuid() == id || segment.line.as_uuid() == id,
        }
    }
}

impl<T: Into<Uuid>> From<Option<T>> for RelationFilter {
    fn from(id: Option<T>) -> Self {
        RelationFilter(id.map(Into::into))
    }
}

fn lookup<'a>(
    segments: &'a BTreeMap<SegmentId, Segment>,
    id: &SegmentId,
) -> Result<&'a Segment, TopologyError> {
    segments
        .get(id)
        .ok_or_else(|| TopologyError::NotFound(format!("indexed segment {id}")))
}

/// Classify every segment touching `point`.
pub fn relations_at(
    point: &RouteNodeId,
    filter: RelationFilter,
    direction: DirectionConvention,
    index: &TopologyIndex,
    segments: &BTreeMap<SegmentId, Segment>,
) -> Result<Vec<SegmentRelation>, TopologyError> {
    let mut relations = Vec::new();
    for id in index.ends_at(point) {
        let segment = lookup(segments, id)?;
        if !filter.accepts(segment) {
            continue;
        }
        let kind = if segment.from_node == *point {
            direction.at_from_node()
        } else {
            direction.at_to_node()
        };
        relations.push(SegmentRelation {
            segment: segment.id,
            line: segment.line,
            kind,
        });
    }
    for id in index.passes_through(point) {
        let segment = lookup(segments, id)?;
        if !filter.accepts(segment) {
            continue;
        }
        relations.push(SegmentRelation {
            segment: segment.id,
            line: segment.line,
            kind: RelationKind::PassThrough,
        });
    }
    Ok(relations)
}

/// Every segment whose span covers `route_segment`, as PassThrough.
pub fn relations_on_route_segment(
    route_segment: &RouteSegmentId,
    filter: RelationFilter,
    index: &TopologyIndex,
    segments: &BTreeMap<SegmentId, Segment>,
) -> Result<Vec<SegmentRelation>, TopologyError> {
    let mut relations = Vec::new();
    for id in index.passes_by(route_segment) {
        let segment = lookup(segments, id)?;
        if filter.accepts(segment) {
            relations.push(SegmentRelation {
                segment: segment.id,
                line: segment.line,
                kind: RelationKind::PassThrough,
            });
        }
    }
    Ok(relations)
}

/// Count relations by kind.
pub fn tally(relations: &[SegmentRelation]) -> BTreeMap<RelationKind, usize> {
    let mut counts = BTreeMap::new();
    for relation in relations {
        *counts.entry(relation.kind).or_insert(0) += 1;
    }
    counts
}
