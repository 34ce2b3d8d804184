//! Error types.
//!
//! A single error enum is shared by every Tessera crate so errors raised by a
//! backend surface unchanged through the session that called it.

use crate::schema::{ClassId, RelationId};
use crate::types::EntityId;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the object graph, sessions and backends.
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong shape or kind of key, relation, class filter or value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The edge being added already exists.
    #[error("{entity} is already connected to {target} under relation {relation}")]
    DuplicateEdge {
        /// Entity on which `add` was called.
        entity: EntityId,
        /// Relation of the edge.
        relation: RelationId,
        /// Neighbor that is already connected.
        target: EntityId,
    },

    /// A removal filter matched no edge.
    #[error("nothing to remove: no edge matched the filter")]
    NothingRemoved,

    /// No relation was given and the class has no default relation.
    #[error("no relation given and class {0} has no default relation")]
    MissingRelation(ClassId),

    /// A mutation hit an entity that is pending deletion.
    #[error("entity {0} is pending deletion and cannot be modified")]
    DeletedObjectMutation(EntityId),

    /// A query result expected to hold exactly one item was empty.
    #[error("query returned no results")]
    EmptyResult,

    /// A query result expected to hold at most one item had more.
    #[error("query returned more than one result")]
    MultipleResults,

    /// The entity is not resident in the session.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// The single-wrapper rule was broken.
    #[error("wrapper violation: {0}")]
    WrapperViolation(String),

    /// A structural cardinality constraint does not hold.
    #[error("entity {entity} has {count} edges under relation {relation}, expected {min}..={max}")]
    CardinalityViolation {
        /// Offending entity.
        entity: EntityId,
        /// Constrained relation.
        relation: RelationId,
        /// Observed number of edges.
        count: usize,
        /// Lower bound.
        min: usize,
        /// Upper bound (`usize::MAX` when unbounded).
        max: usize,
    },

    /// The session has been closed.
    #[error("session is closed")]
    SessionClosed,

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend contract violation or backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Backend transaction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Transaction was aborted.
    #[error("transaction aborted")]
    Aborted,

    /// Invalid transaction state.
    #[error("invalid transaction state: {0}")]
    InvalidState(String),
}

/// Storage-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Data corruption detected.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}
