//! Structural parent/child links derived from route overlap.
//!
//! Two segments are linked when the route segments their spans cover intersect. Links are never
//! stored with the segments; they are a pure function of two lines' segmentations and are cached
//! per version pair.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    error::TopologyError,
    properties::{LineId, RouteSegmentId, SegmentId},
    topology::line::{Line, Segment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlapKey {
    pub child: LineId,
    pub child_version: u64,
    pub parent: LineId,
    pub parent_version: u64,
}

impl OverlapKey {
    pub fn new(child: &Line, parent: &Line) -> OverlapKey {
        OverlapKey {
            child: child.id,
            child_version: child.version,
            parent: parent.id,
            parent_version: parent.version,
        }
    }
}

/// Links between the segments of one child line and one parent line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapLinks {
    /// child segment -> overlapping parent segments
    pub parents: BTreeMap<SegmentId, BTreeSet<SegmentId>>,
    /// parent segment -> overlapping child segments
    pub children: BTreeMap<SegmentId, BTreeSet<SegmentId>>,
}

fn footprint(
    line: &Line,
    segments: &BTreeMap<SegmentId, Segment>,
) -> Result<Vec<(SegmentId, BTreeSet<RouteSegmentId>)>, TopologyError> {
    line.segments
        .iter()
        .map(|id| {
            let segment = segments.get(id).ok_or_else(|| {
                TopologyError::NotFound(format!("segment {id} of line {}", line.id))
            })?;
            let covered = segment
                .route_segments(line.walk())?
                .iter()
                .copied()
                .collect::<BTreeSet<_>>();
            Ok((*id, covered))
        })
        .collect()
}

pub fn compute_overlap(
    child: &Line,
    parent: &Line,
    segments: &BTreeMap<SegmentId, Segment>,
) -> Result<OverlapLinks, TopologyError> {
    let child_sets = footprint(child, segments)?;
    let parent_sets = footprint(parent, segments)?;
    let mut links = OverlapLinks::default();
    for (child_segment, child_set) in child_sets.iter() {
        for (parent_segment, parent_set) in parent_sets.iter() {
            if !child_set.is_disjoint(parent_set) {
                links
                    .parents
                    .entry(*child_segment)
                    .or_default()
                    .insert(*parent_segment);
                links
                    .children
                    .entry(*parent_segment)
                    .or_default()
                    .insert(*child_segment);
            }
        }
    }
    Ok(links)
}

/// Memo of [OverlapLinks], holding at most one entry per (child, parent) line pair.
#[derive(Debug, Default)]
pub struct OverlapCache {
    entries: BTreeMap<(LineId, LineId), (OverlapKey, Arc<OverlapLinks>)>,
}

impl OverlapCache {
    pub fn get_or_compute(
        &mut self,
        child: &Line,
        parent: &Line,
        segments: &BTreeMap<SegmentId, Segment>,
    ) -> Result<Arc<OverlapLinks>, TopologyError> {
        let key = OverlapKey::new(child, parent);
        if let Some((cached_key, links)) = self.entries.get(&(key.child, key.parent)) {
            if *cached_key == key {
                return Ok(links.clone());
            }
        }
        let links = Arc::new(compute_overlap(child, parent, segments)?);
        self.entries
            .insert((key.child, key.parent), (key, links.clone()));
        Ok(links)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
