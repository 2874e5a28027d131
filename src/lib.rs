//! # ospnet-core
//!
//! A topology engine for telecom outside-plant line networks.
//!
//! ## Overview
//!
//! Conduits and cables are placed along walks through a civil route network (ducts, trenches,
//! poles). Over their lifetime they are cut at route nodes and spliced to one another. ospnet-core
//! keeps the resulting line/segment/junction topology and answers the questions field planning
//! asks of it: what touches this point, what runs inside what, and what is connected to what.
//!
//! ### Key Features
//!
//! - **Event sourced**: every line is an append-only stream of placed/cut/connected events; the
//!   in-memory model is a disposable projection that reloads deterministically
//! - **Cut engine**: a line starts as one segment spanning its walk; each cut splits exactly one
//!   segment at a strictly interior route node
//! - **Derived nesting**: parent/child links between an inner conduit or cable and its container
//!   are recomputed from route overlap, never stored
//! - **Point queries**: incrementally maintained reverse indices classify every segment at a
//!   route node as Incoming, Outgoing or PassThrough
//! - **Connectivity**: undirected traversal across segments and splice junctions
//!
//! ## Architecture
//!
//! - **[`properties`]**: identifiers, line kinds and relation enums
//! - **[`route`]**: the route network collaborator and its in-memory implementation
//! - **[`event`]**: line events and change notifications
//! - **[`eventlog`]**: per-line event streams with optimistic versioning
//! - **[`topology`]**: the projection, indices, relation resolver, traversal and
//!   [`topology::TopologyStore`]
//! - **[`commands`]**: serializable commands and queries
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ospnet_core::{
//!     config::TopologyConfig,
//!     properties::{EndKind, JunctionId, LineId, RelationKind},
//!     route::InMemoryRouteNetwork,
//!     topology::TopologyStore,
//! };
//!
//! # fn main() -> Result<(), ospnet_core::TopologyError> {
//! let network = Arc::new(InMemoryRouteNetwork::new());
//! let cabinet = network.add_node("cabinet");
//! let handhole = network.add_node("handhole");
//! let house = network.add_node("house");
//! network.add_segment(cabinet, handhole, "")?;
//! network.add_segment(handhole, house, "")?;
//! let walk = network.register_walk_through(&[cabinet, handhole, house])?;
//!
//! let store = TopologyStore::new(network, TopologyConfig::default())?;
//! let multi = LineId::new();
//! store.place_multi_conduit(multi, walk, 7, "7x10mm")?;
//! store.cut(multi, Some(3), handhole, None)?;
//! store.connect(multi, Some(3), handhole, EndKind::Incoming, JunctionId::new(), None)?;
//!
//! let relations = store.relations_at(&handhole, None)?;
//! assert_eq!(
//!     relations.iter().filter(|r| r.kind == RelationKind::PassThrough).count(),
//!     7
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `ospnet` command line tool

pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod properties;
pub mod route;
#[cfg(test)]
mod tests;
pub mod topology;

pub use error::*;
