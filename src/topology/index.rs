use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::TopologyError,
    properties::{LineId, RouteNodeId, RouteSegmentId, SegmentId},
    route::WalkOfInterest,
    topology::line::Segment,
};

/// What one line contributed to the index, so its entries can be withdrawn on the next upsert.
#[derive(Debug, Clone, Default, Serialize)]
struct Footprint {
    ends_at: Vec<(RouteNodeId, SegmentId)>,
    passes_through: Vec<(RouteNodeId, SegmentId)>,
    passes_by: Vec<(RouteSegmentId, SegmentId)>,
}

/// Reverse indices from route elements to the segments touching them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologyIndex {
    ends_at: BTreeMap<RouteNodeId, BTreeSet<SegmentId>>,
    passes_through: BTreeMap<RouteNodeId, BTreeSet<SegmentId>>,
    passes_by: BTreeMap<RouteSegmentId, BTreeSet<SegmentId>>,
    #[serde(skip)]
    footprints: BTreeMap<LineId, Footprint>,
}

fn remove_entry<K: Ord>(map: &mut BTreeMap<K, BTreeSet<SegmentId>>, key: &K, segment: &SegmentId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(segment);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

impl TopologyIndex {
    /// Replace every entry contributed by `line` with entries for `segments`. The new footprint
    /// is computed before anything is removed, so a failure leaves the index untouched.
    pub fn upsert_line<'a, I>(
        &mut self,
        line: LineId,
        walk: &WalkOfInterest,
        segments: I,
    ) -> Result<(), TopologyError>
    where
        I: IntoIterator<Item = &'a Segment>,
    {
        let mut footprint = Footprint::default();
        for segment in segments {
            let sub = walk.sub_walk(&segment.from_node, &segment.to_node)?;
            footprint.ends_at.push((segment.from_node, segment.id));
            footprint.ends_at.push((segment.to_node, segment.id));
            for node in sub.interior_node_ids() {
                footprint.passes_through.push((*node, segment.id));
            }
            for route_segment in sub.segment_ids {
                footprint.passes_by.push((*route_segment, segment.id));
            }
        }

        self.remove_line(&line);
        for (node, segment) in footprint.ends_at.iter() {
            self.ends_at.entry(*node).or_default().insert(*segment);
        }
        for (node, segment) in footprint.passes_through.iter() {
            self.passes_through.entry(*node).or_default().insert(*segment);
        }
        for (route_segment, segment) in footprint.passes_by.iter() {
            self.passes_by
                .entry(*route_segment)
                .or_default()
                .insert(*segment);
        }
        self.footprints.insert(line, footprint);
        Ok(())
    }

    pub fn remove_line(&mut self, line: &LineId) {
        let Some(stale) = self.footprints.remove(line) else {
            return;
        };
        for (node, segment) in stale.ends_at.iter() {
            remove_entry(&mut self.ends_at, node, segment);
        }
        for (node, segment) in stale.passes_through.iter() {
            remove_entry(&mut self.passes_through, node, segment);
        }
        for (route_segment, segment) in stale.passes_by.iter() {
            remove_entry(&mut self.passes_by, route_segment, segment);
        }
    }

    /// Segments with an end at `node`.
    pub fn ends_at(&self, node: &RouteNodeId) -> impl Iterator<Item = &SegmentId> {
        self.ends_at.get(node).into_iter().flatten()
    }

    /// Segments for which `node` is strictly interior.
    pub fn passes_through(&self, node: &RouteNodeId) -> impl Iterator<Item = &SegmentId> {
        self.passes_through.get(node).into_iter().flatten()
    }

    /// Segments whose span covers `route_segment`.
    pub fn passes_by(&self, route_segment: &RouteSegmentId) -> impl Iterator<Item = &SegmentId> {
        self.passes_by.get(route_segment).into_iter().flatten()
    }
}
