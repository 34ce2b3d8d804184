//! Core type definitions for Tessera.
//!
//! This module contains all fundamental types used throughout the object graph:
//! - Identifier types ([`EntityId`], [`SessionId`], [`TxId`])
//! - Attribute value types ([`Value`], [`LogicalType`])

mod id;
mod logical_type;
mod value;

pub use id::{EntityId, SessionId, TxId};
pub use logical_type::LogicalType;
pub use value::Value;
