use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::properties::{EndKind, JunctionId, LineId, RouteNodeId, SegmentId};

/// Segment ends attached to a junction on behalf of one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incidence {
    /// Segments whose `to` end is attached here
    pub incoming: BTreeSet<SegmentId>,
    /// Segments whose `from` end is attached here
    pub outgoing: BTreeSet<SegmentId>,
}

impl Incidence {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &SegmentId> {
        self.incoming.iter().chain(self.outgoing.iter())
    }
}

/// A connectivity point. Route-node junctions share the route node's identity across all lines
/// but traversal only crosses them within one line; connector junctions join ends of any lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Junction {
    pub id: JunctionId,
    pub route_node: Option<RouteNodeId>,
    pub external_connector: Option<JunctionId>,
    pub lines: BTreeMap<LineId, Incidence>,
}

impl Junction {
    pub fn at_route_node(node: RouteNodeId) -> Junction {
        Junction {
            id: JunctionId::at_route_node(node),
            route_node: Some(node),
            external_connector: None,
            lines: BTreeMap::new(),
        }
    }

    pub fn connector(id: JunctionId) -> Junction {
        Junction {
            id,
            route_node: None,
            external_connector: Some(id),
            lines: BTreeMap::new(),
        }
    }

    pub fn is_connector(&self) -> bool {
        self.route_node.is_none()
    }

    pub(crate) fn attach(&mut self, line: LineId, segment: SegmentId, end: EndKind) {
        let incidence = self.lines.entry(line).or_default();
        match end {
            EndKind::Incoming => incidence.incoming.insert(segment),
            EndKind::Outgoing => incidence.outgoing.insert(segment),
        };
    }

    pub(crate) fn detach(&mut self, line: LineId, segment: SegmentId, end: EndKind) {
        if let Some(incidence) = self.lines.get_mut(&line) {
            match end {
                EndKind::Incoming => incidence.incoming.remove(&segment),
                EndKind::Outgoing => incidence.outgoing.remove(&segment),
            };
            if incidence.is_empty() {
                self.lines.remove(&line);
            }
        }
    }

    /// Incident segments visible from `scope`: one line's ends, or every line's when `None`.
    pub fn segments_in_scope(&self, scope: Option<LineId>) -> BTreeSet<SegmentId> {
        match scope {
            Some(line) => self
                .lines
                .get(&line)
                .map(|inc| inc.segments().copied().collect())
                .unwrap_or_default(),
            None => self
                .lines
                .values()
                .flat_map(|inc| inc.segments().copied())
                .collect(),
        }
    }

    /// The junction restricted to one line's incidence.
    pub fn scoped(&self, line: LineId) -> Junction {
        Junction {
            id: self.id,
            route_node: self.route_node,
            external_connector: self.external_connector,
            lines: self
                .lines
                .get(&line)
                .map(|inc| BTreeMap::from([(line, inc.clone())]))
                .unwrap_or_default(),
        }
    }
}
