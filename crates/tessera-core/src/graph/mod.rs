//! Entities and adjacency.
//!
//! An [`Entity`] never points at another entity directly. Its [`Relations`]
//! only record `(neighbor id, neighbor class)` pairs; turning an id back into
//! an entity always goes through the owning session's registry.

mod entity;
mod relations;

pub use entity::Entity;
pub use relations::Relations;
