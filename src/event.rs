use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::properties::{EndKind, JunctionId, LineId, LineKind, RouteNodeId, WalkId};

/// A fact recorded in a line's event stream. The stream of every line starts with exactly one
/// [LineEvent::Placed]; cut and connect events follow in the order they were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LineEvent {
    Placed {
        line: LineId,
        kind: LineKind,
        walk: WalkId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<LineId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u16>,
        #[serde(default)]
        name: String,
    },
    /// The line was cut at a route node
    Cut { line: LineId, point: RouteNodeId },
    /// A segment end at `point` was attached to a connector junction
    Connected {
        line: LineId,
        point: RouteNodeId,
        end: EndKind,
        junction: JunctionId,
    },
}

impl LineEvent {
    /// The line whose stream this event belongs to
    pub fn line(&self) -> LineId {
        match self {
            LineEvent::Placed { line, .. } => *line,
            LineEvent::Cut { line, .. } => *line,
            LineEvent::Connected { line, .. } => *line,
        }
    }
}

impl Display for LineEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            LineEvent::Placed { line, kind, .. } => write!(f, "Placed({kind} {line})"),
            LineEvent::Cut { line, point } => write!(f, "Cut({line} @ {point})"),
            LineEvent::Connected {
                line,
                point,
                end,
                junction,
            } => write!(f, "Connected({line} {end} @ {point} -> {junction})"),
        }
    }
}

/// Change notifications published by a [crate::topology::TopologyStore] after state has been
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyEvent {
    /// The line's projection now reflects stream version `version`
    LineUpdated { line: LineId, version: u64 },
    /// The projection was rebuilt from the log
    Reloaded { lines: usize, fingerprint: String },
}

impl Display for TopologyEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TopologyEvent::LineUpdated { line, version } => {
                write!(f, "LineUpdated({line} v{version})")
            }
            TopologyEvent::Reloaded { lines, .. } => write!(f, "Reloaded({lines} lines)"),
        }
    }
}
