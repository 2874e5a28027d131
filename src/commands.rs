use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    properties::{
        EndKind, JunctionId, LineId, LineKind, RouteNodeId, RouteSegmentId, SegmentId, Uuid,
        WalkId,
    },
    topology::{Junction, LineInfo, SegmentInfo, SegmentRelation, TraversalNode},
};

/// Mutations accepted by [crate::topology::TopologyStore::execute]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Command {
    /// Place one line along a registered walk of interest. Inner conduits follow their parent's
    /// walk; `walk` may be nil for them.
    CreateLine {
        id: LineId,
        walk: WalkId,
        kind: LineKind,
        #[serde(default)]
        parent: Option<LineId>,
        #[serde(default)]
        sequence_number: Option<u16>,
        #[serde(default)]
        name: String,
    },
    /// Place a multi-conduit together with inner conduits 1..=inner_conduit_count. Without a
    /// count the store's configured default applies.
    CreateMultiConduit {
        id: LineId,
        walk: WalkId,
        #[serde(default)]
        inner_conduit_count: Option<u16>,
        #[serde(default)]
        name: String,
    },
    CutLine {
        line: LineId,
        /// Cut inner conduit `sequence_number` of `line` instead of `line` itself
        #[serde(default)]
        sequence_number: Option<u16>,
        point: RouteNodeId,
        #[serde(default)]
        expected_version: Option<u64>,
    },
    ConnectLine {
        line: LineId,
        #[serde(default)]
        sequence_number: Option<u16>,
        point: RouteNodeId,
        end: EndKind,
        junction: JunctionId,
        #[serde(default)]
        expected_version: Option<u64>,
    },
}

impl Command {
    /// The line the command is addressed to
    pub fn line(&self) -> LineId {
        match self {
            Command::CreateLine { id, .. } => *id,
            Command::CreateMultiConduit { id, .. } => *id,
            Command::CutLine { line, .. } => *line,
            Command::ConnectLine { line, .. } => *line,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Command::CreateLine { id, kind, .. } => write!(f, "CreateLine({kind} {id})"),
            Command::CreateMultiConduit {
                id,
                inner_conduit_count: Some(count),
                ..
            } => write!(f, "CreateMultiConduit({id} x{count})"),
            Command::CreateMultiConduit { id, .. } => write!(f, "CreateMultiConduit({id})"),
            Command::CutLine {
                line,
                sequence_number: Some(seq),
                point,
                ..
            } => write!(f, "CutLine({line}#{seq} @ {point})"),
            Command::CutLine { line, point, .. } => write!(f, "CutLine({line} @ {point})"),
            Command::ConnectLine {
                line,
                sequence_number,
                point,
                end,
                junction,
                ..
            } => match sequence_number {
                Some(seq) => write!(f, "ConnectLine({line}#{seq} {end} @ {point} -> {junction})"),
                None => write!(f, "ConnectLine({line} {end} @ {point} -> {junction})"),
            },
        }
    }
}

/// A line's stream version after a command was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedVersion {
    pub line: LineId,
    pub version: u64,
}

/// Reads answered by [crate::topology::TopologyStore::query]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query")]
pub enum Query {
    GetLine {
        id: LineId,
    },
    GetSegment {
        id: SegmentId,
    },
    GetJunction {
        id: JunctionId,
        #[serde(default)]
        scope: Option<LineId>,
    },
    GetRelationsAt {
        point: RouteNodeId,
        /// Matches either a segment id or a line id
        #[serde(default)]
        filter: Option<Uuid>,
    },
    GetRelationsOnRouteSegment {
        route_segment: RouteSegmentId,
        #[serde(default)]
        filter: Option<Uuid>,
    },
    Traverse {
        start: SegmentId,
    },
    IsCutAt {
        line: LineId,
        point: RouteNodeId,
    },
    InnerConduit {
        line: LineId,
        sequence_number: u16,
    },
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Query::GetLine { id } => write!(f, "GetLine({id})"),
            Query::GetSegment { id } => write!(f, "GetSegment({id})"),
            Query::GetJunction { id, .. } => write!(f, "GetJunction({id})"),
            Query::GetRelationsAt { point, .. } => write!(f, "GetRelationsAt({point})"),
            Query::GetRelationsOnRouteSegment { route_segment, .. } => {
                write!(f, "GetRelationsOnRouteSegment({route_segment})")
            }
            Query::Traverse { start } => write!(f, "Traverse({start})"),
            Query::IsCutAt { line, point } => write!(f, "IsCutAt({line} @ {point})"),
            Query::InnerConduit {
                line,
                sequence_number,
            } => write!(f, "InnerConduit({line}#{sequence_number})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
    Line(LineInfo),
    Segment(SegmentInfo),
    Junction(Junction),
    Relations(Vec<SegmentRelation>),
    Nodes(Vec<TraversalNode>),
    Flag(bool),
    LineId(LineId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_command_json_shape() {
        let line = LineId::new();
        let point = RouteNodeId::new();
        let text = format!(r#"{{"op":"CutLine","line":"{line}","point":"{point}"}}"#);
        let command: Command = serde_json::from_str(&text).unwrap();
        assert_eq!(
            command,
            Command::CutLine {
                line,
                sequence_number: None,
                point,
                expected_version: None,
            }
        );
        assert_eq!(command.line(), line);
        assert_eq!(command.to_string(), format!("CutLine({line} @ {point})"));
    }

    #[test]
    fn test_multi_conduit_count_is_optional() {
        let id = LineId::new();
        let walk = WalkId::new();
        let text = format!(r#"{{"op":"CreateMultiConduit","id":"{id}","walk":"{walk}"}}"#);
        let command: Command = serde_json::from_str(&text).unwrap();
        assert_eq!(
            command,
            Command::CreateMultiConduit {
                id,
                walk,
                inner_conduit_count: None,
                name: String::new(),
            }
        );
        assert_eq!(command.to_string(), format!("CreateMultiConduit({id})"));
    }

    #[test]
    fn test_query_json_shape() {
        let id = SegmentId::new();
        let text = format!(r#"{{"query":"Traverse","start":"{id}"}}"#);
        let query: Query = serde_json::from_str(&text).unwrap();
        assert_eq!(query, Query::Traverse { start: id });
    }
}
