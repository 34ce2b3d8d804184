//! # tessera-core
//!
//! Core layer for Tessera: the in-memory object graph and the primitives
//! sessions are built from.
//!
//! This crate depends only on `tessera-common`.
//!
//! ## Modules
//!
//! - [`graph`] - Entities and their adjacency ([`Entity`], [`Relations`])
//! - [`registry`] - Per-session identity map with reachability and pruning
//! - [`session`] - Notification hooks, the base [`Session`] and the [`Node`] accessor
//! - [`merge`] - Cross-session clone-and-repair
//! - [`backend`] - The storage collaborator contract

pub mod backend;
pub mod graph;
pub mod merge;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use backend::Backend;
pub use graph::{Entity, Relations};
pub use merge::{NeighborDiff, merge, neighbor_diff};
pub use registry::Registry;
pub use session::{
    Foreign, GraphSession, GraphSessionExt, Neighbor, NeighborQuery, Node, Session, Target,
};
