//! [crate::properties] contains the basic building blocks of the topology model: identifiers,
//! line kinds and the small enums shared by commands, events and queries.
pub use enumset::EnumSet;
use enumset::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

pub use uuid::Uuid;

use crate::error::TopologyError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random identifier.
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                $name(Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                $name(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TopologyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(Uuid::parse_str(s)?))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

uuid_id!(
    /// Identifies a placed [crate::topology::Line].
    LineId
);
uuid_id!(
    /// Identifies a [crate::topology::Segment] within the segment arena.
    SegmentId
);
uuid_id!(
    /// Identifies a [crate::topology::Junction]. Route-node junctions reuse the route node's
    /// UUID; connector junctions use an externally allocated id.
    JunctionId
);
uuid_id!(RouteNodeId);
uuid_id!(RouteSegmentId);
uuid_id!(
    /// Identifies a registered [crate::route::WalkOfInterest].
    WalkId
);

impl LineId {
    /// The id of inner conduit `sequence_number` within multi-conduit `parent`. Stable across
    /// replays.
    pub fn inner_conduit(parent: LineId, sequence_number: u16) -> LineId {
        LineId(Uuid::new_v5(
            &parent.0,
            format!("inner-conduit/{sequence_number}").as_bytes(),
        ))
    }
}

impl SegmentId {
    /// The id of the span `[from, to]` on `line`. A span that has been replaced by a cut never
    /// reappears on the same line, so the id is unique over the line's lifetime.
    pub fn for_span(line: LineId, from: RouteNodeId, to: RouteNodeId) -> SegmentId {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(from.0.as_bytes());
        name[16..].copy_from_slice(to.0.as_bytes());
        SegmentId(Uuid::new_v5(&line.0, &name))
    }
}

impl JunctionId {
    /// The junction every cut at `node` attaches to. Derived from the node id rather than equal
    /// to it, so connector ids allocated by callers (v4) never land on a route-node junction.
    /// Route-node and connector junctions still share one id space: a connector that reuses
    /// this id blocks cuts at `node`.
    pub fn at_route_node(node: RouteNodeId) -> JunctionId {
        JunctionId(Uuid::new_v5(&node.0, b"route-node-junction"))
    }
}

/// The kind of a placed line asset.
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(serialize_repr = "list")]
pub enum LineKind {
    /// An outer conduit carrying a bundle of inner conduits
    MultiConduit,
    /// A top-level single conduit
    SingleConduit,
    /// A single conduit nested inside a multi-conduit, addressed by sequence number
    InnerConduit,
    FiberCable,
}

impl LineKind {
    /// The kinds a line of this kind may be nested in.
    pub fn allowed_parents(&self) -> EnumSet<LineKind> {
        match self {
            LineKind::MultiConduit | LineKind::SingleConduit => EnumSet::empty(),
            LineKind::InnerConduit => LineKind::MultiConduit.into(),
            LineKind::FiberCable => {
                LineKind::MultiConduit | LineKind::SingleConduit | LineKind::InnerConduit
            }
        }
    }

    /// Whether a line of this kind must name a parent line.
    pub fn requires_parent(&self) -> bool {
        matches!(self, LineKind::InnerConduit)
    }
}

impl Display for LineKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            LineKind::MultiConduit => write!(f, "MultiConduit"),
            LineKind::SingleConduit => write!(f, "SingleConduit"),
            LineKind::InnerConduit => write!(f, "InnerConduit"),
            LineKind::FiberCable => write!(f, "FiberCable"),
        }
    }
}

/// Which end of a segment a connect operation addresses, relative to a point of interest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum EndKind {
    /// The end of the segment whose `to` route node is the point
    Incoming,
    /// The start of the segment whose `from` route node is the point
    Outgoing,
}

impl Display for EndKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            EndKind::Incoming => write!(f, "Incoming"),
            EndKind::Outgoing => write!(f, "Outgoing"),
        }
    }
}

/// How a segment relates to a point of interest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationKind {
    Incoming,
    Outgoing,
    PassThrough,
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RelationKind::Incoming => write!(f, "Incoming"),
            RelationKind::Outgoing => write!(f, "Outgoing"),
            RelationKind::PassThrough => write!(f, "PassThrough"),
        }
    }
}

/// Maps segment endpoints onto [RelationKind]s.
///
/// Directionality is fixed when a line is placed: the walk's element order is the line's
/// orientation. No physical signal-flow convention is involved.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DirectionConvention {
    /// A segment is Outgoing at its `from` node and Incoming at its `to` node.
    #[default]
    WalkOrder,
    /// A segment is Incoming at its `from` node and Outgoing at its `to` node.
    Reversed,
}

impl DirectionConvention {
    pub fn at_from_node(&self) -> RelationKind {
        match self {
            DirectionConvention::WalkOrder => RelationKind::Outgoing,
            DirectionConvention::Reversed => RelationKind::Incoming,
        }
    }

    pub fn at_to_node(&self) -> RelationKind {
        match self {
            DirectionConvention::WalkOrder => RelationKind::Incoming,
            DirectionConvention::Reversed => RelationKind::Outgoing,
        }
    }
}
