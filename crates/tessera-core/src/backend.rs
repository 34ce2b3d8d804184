//! Storage collaborator contract.
//!
//! A [`Backend`] persists entities on behalf of a buffering session. The
//! session decides *what* changed; the backend only has to write, read and
//! bracket writes in a transaction.
//!
//! Entities handed to a backend are detached snapshots: no session state
//! travels with them, so a backend may keep or serialize them freely.

use crate::graph::Entity;
use tessera_common::types::EntityId;
use tessera_common::utils::error::Result;
use tessera_common::utils::hash::FxHashSet;

/// Persistence hooks used by a buffering session.
pub trait Backend {
    /// Backend-specific connection settings.
    type Config;

    /// Connects to the storage described by `config`.
    fn open(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Releases the connection. Further calls may fail.
    fn close(&mut self) -> Result<()>;

    /// Starts a write transaction.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Makes the current transaction's writes durable and visible.
    fn commit_transaction(&mut self) -> Result<()>;

    /// Discards the current transaction's writes.
    fn rollback_transaction(&mut self) -> Result<()>;

    /// Persists entities created in the session.
    fn apply_added(&mut self, entities: &[Entity]) -> Result<()>;

    /// Persists new versions of already stored entities.
    fn apply_updated(&mut self, entities: &[Entity]) -> Result<()>;

    /// Removes entities. Only their ids are significant.
    fn apply_deleted(&mut self, entities: &[Entity]) -> Result<()>;

    /// Loads entities by id.
    ///
    /// Returns exactly one slot per requested id, in order; `None` means the
    /// entity no longer exists. `expired` is the subset of `ids` the session
    /// already holds a stale copy of.
    fn load_missing(
        &mut self,
        ids: &[EntityId],
        expired: &FxHashSet<EntityId>,
    ) -> Result<Vec<Option<Entity>>>;

    /// Prepares storage for a session that has not stored anything yet.
    fn initialize(&mut self) -> Result<()>;

    /// Loads the wrapper and its direct neighbors, wrapper first.
    fn load_first_level(&mut self, root: EntityId) -> Result<Vec<Entity>>;
}
