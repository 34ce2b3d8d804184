//! # tessera-common
//!
//! Foundation layer for Tessera: identifiers, values, schema descriptors,
//! and utilities.
//!
//! This crate provides the fundamental building blocks used by all other
//! Tessera crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (EntityId, SessionId, Value, LogicalType)
//! - [`schema`] - Class, relation and attribute descriptors
//! - [`utils`] - Utility functions and helpers (hashing, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod schema;
pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use schema::{AttributeId, ClassId, RelationId, Schema, SchemaBuilder};
pub use types::{EntityId, LogicalType, SessionId, TxId, Value};
pub use utils::error::{Error, Result};
