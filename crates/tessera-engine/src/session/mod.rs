//! Buffering session synchronized with a backend.
//!
//! A [`WrapperSession`] tracks every change made through it in one of two
//! [`Buffer`]s, selected by the current [`Context`]:
//!
//! - `User` holds changes made by client code; `commit` drains it into the
//!   backend inside a transaction
//! - `Engine` holds changes made while installing backend results; it is
//!   cleared each time engine work starts and never committed
//!
//! After a commit, the written entities are marked expired. The next access
//! to an expired entity reloads it from the backend, and neighbors whose
//! edges changed in the meantime are expired in turn.

mod buffer;
mod context;

pub use buffer::{Buffer, Pending};
pub use context::Context;

use crate::result::QueryResult;
use buffer::Buffers;
use std::sync::Arc;
use std::vec;
use tessera_common::types::EntityId;
use tessera_common::utils::error::{Error, Result};
use tessera_common::utils::hash::FxHashSet;
use tessera_common::{RelationId, Schema};
use tessera_core::{Backend, Entity, GraphSession, NeighborDiff, Registry, neighbor_diff};

/// Ids returned by [`WrapperSession::load`].
pub type Loaded = QueryResult<vec::IntoIter<EntityId>>;

/// A session that buffers changes and synchronizes them with a backend.
pub struct WrapperSession<B: Backend> {
    registry: Registry,
    backend: B,
    buffers: Buffers,
    contexts: Vec<Context>,
    expired: FxHashSet<EntityId>,
    bootstrapped: bool,
    expire_on_commit: bool,
    closed: bool,
}

impl<B: Backend> WrapperSession<B> {
    /// Creates a session over an already opened backend.
    #[must_use]
    pub fn new(schema: Arc<Schema>, backend: B) -> Self {
        Self {
            registry: Registry::new(schema),
            backend,
            buffers: Buffers::default(),
            contexts: Vec::new(),
            expired: FxHashSet::default(),
            bootstrapped: false,
            expire_on_commit: true,
            closed: false,
        }
    }

    /// Opens the backend and creates a session over it.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `open` error.
    pub fn open(schema: Arc<Schema>, config: &B::Config) -> Result<Self> {
        Ok(Self::new(schema, B::open(config)?))
    }

    /// Sets whether committed entities are expired afterwards.
    #[must_use]
    pub fn with_expire_on_commit(mut self, expire: bool) -> Self {
        self.expire_on_commit = expire;
        self
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the context mutations are currently attributed to.
    #[must_use]
    pub fn current_context(&self) -> Context {
        self.contexts.last().copied().unwrap_or_default()
    }

    /// Runs `f` with `context` active, restoring the previous one afterwards.
    ///
    /// Entering `Engine` from another context clears the engine buffer first.
    pub fn with_context<T>(&mut self, context: Context, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if context == Context::Engine && self.current_context() != Context::Engine {
            self.buffers.get_mut(Context::Engine).clear();
        }
        self.contexts.push(context);
        let out = f(self);
        self.contexts.pop();
        out
    }

    /// Returns a context's buffer.
    #[must_use]
    pub fn buffer(&self, context: Context) -> &Buffer {
        self.buffers.get(context)
    }

    /// Returns true if the id has uncommitted user changes.
    #[must_use]
    pub fn is_dirty(&self, id: EntityId) -> bool {
        self.buffers.get(Context::User).contains(id)
    }

    /// Returns true if the id is marked stale.
    #[must_use]
    pub fn is_expired(&self, id: EntityId) -> bool {
        self.expired.contains(&id)
    }

    /// Returns true once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// Writes the user buffer to the backend in one transaction.
    ///
    /// The buffer is emptied before anything else happens. If validation or
    /// any backend call fails, the transaction is rolled back and the error
    /// is returned; the drained changes are not put back.
    ///
    /// # Errors
    ///
    /// Returns `CardinalityViolation` if a changed entity breaks a class
    /// constraint, or the backend's error.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let (added, updated, deleted) = self.buffers.get_mut(Context::User).take().into_parts();
        let added = self.snapshots(&added);
        let updated = self.snapshots(&updated);
        let deleted: Vec<Entity> = deleted.into_values().collect();

        self.check_cardinality(added.iter().chain(&updated))?;

        self.backend.begin_transaction()?;
        let written = self
            .backend
            .apply_added(&added)
            .and_then(|()| self.backend.apply_updated(&updated))
            .and_then(|()| self.backend.apply_deleted(&deleted))
            .and_then(|()| self.backend.commit_transaction());
        if let Err(e) = written {
            if let Err(rollback) = self.backend.rollback_transaction() {
                tracing::warn!("rollback after failed commit also failed: {}", rollback);
            }
            return Err(e);
        }

        tracing::debug!(
            "committed {} added, {} updated, {} deleted",
            added.len(),
            updated.len(),
            deleted.len()
        );
        if self.expire_on_commit {
            self.expired
                .extend(added.iter().chain(&updated).map(Entity::id));
        }
        Ok(())
    }

    fn snapshots(&self, ids: &indexmap::IndexSet<EntityId>) -> Vec<Entity> {
        ids.iter()
            .filter_map(|&id| {
                let entity = self.registry.get(id).map(Entity::snapshot);
                if entity.is_none() {
                    tracing::warn!("{} is no longer resident, skipping it in commit", id);
                }
                entity
            })
            .collect()
    }

    fn check_cardinality<'a>(&self, entities: impl Iterator<Item = &'a Entity>) -> Result<()> {
        let schema = self.registry.schema();
        for entity in entities {
            for constraint in schema.constraints(entity.class())? {
                let count = entity.relations().count_under(schema, constraint.relation);
                if !constraint.admits(count) {
                    return Err(Error::CardinalityViolation {
                        entity: entity.id(),
                        relation: constraint.relation,
                        count,
                        min: constraint.min,
                        max: constraint.max.unwrap_or(usize::MAX),
                    });
                }
            }
        }
        Ok(())
    }

    /// Makes `ids` resident and fresh, returning those that exist.
    ///
    /// Resident, fresh ids are served from the registry. All others are
    /// requested from the backend in a single `load_missing` call and installed
    /// under the engine context. Ids the backend reports as gone are
    /// destroyed locally. Ids deleted by the user but not yet committed are
    /// left out.
    ///
    /// The result holds the ids that exist after loading, in input order.
    /// It has no slot for gone or pending-deleted ids, so it is shorter than
    /// `ids` when any are missing; use [`contains`](QueryResult::contains) to
    /// check a specific id.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the backend answers with the wrong number of
    /// results or a mismatched id, and propagates backend and registry errors.
    pub fn load(&mut self, ids: &[EntityId]) -> Result<Loaded> {
        self.ensure_open()?;
        self.with_context(Context::Engine, |session| session.load_in_engine(ids))?;
        let user = self.buffers.get(Context::User);
        let found: Vec<EntityId> = ids
            .iter()
            .copied()
            .filter(|&id| self.registry.contains(id) && !user.is_deleted(id))
            .collect();
        Ok(QueryResult::new(found))
    }

    fn load_in_engine(&mut self, ids: &[EntityId]) -> Result<()> {
        let mut requested = FxHashSet::default();
        let mut missing = Vec::new();
        let mut stale = FxHashSet::default();
        for &id in ids {
            if self.buffers.get(Context::User).is_deleted(id) {
                continue;
            }
            let resident = self.registry.contains(id);
            let expired = self.expired.contains(&id);
            if resident && !expired {
                continue;
            }
            if requested.insert(id) {
                missing.push(id);
                if resident {
                    stale.insert(id);
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let results = self.backend.load_missing(&missing, &stale)?;
        if results.len() != missing.len() {
            return Err(Error::Backend(format!(
                "load_missing returned {} results for {} ids",
                results.len(),
                missing.len()
            )));
        }
        tracing::debug!("loaded {} of {} requested entities", results.iter().flatten().count(), missing.len());

        for (id, result) in missing.into_iter().zip(results) {
            let Some(entity) = result else {
                self.expired.remove(&id);
                self.destroy(id)?;
                continue;
            };
            if entity.id() != id {
                return Err(Error::Backend(format!(
                    "load_missing returned {} in the slot of {}",
                    entity.id(),
                    id
                )));
            }
            self.install(entity, stale.contains(&id))?;
        }
        Ok(())
    }

    /// Replaces the resident copy of an entity with a backend version.
    ///
    /// Edges are taken as the backend reports them, including edges to ids
    /// that are not resident. Resident neighbors get their mirror edges
    /// added or removed to match. With `cascade`, neighbors whose edge
    /// changed are expired unless they carry user changes.
    fn install(&mut self, entity: Entity, cascade: bool) -> Result<()> {
        let id = entity.id();
        let class = entity.class();
        let diff = match self.registry.get(id) {
            Some(old) => neighbor_diff(old, &entity),
            None => NeighborDiff {
                added: entity.relations().iter().map(|(r, n, _)| (r, n)).collect(),
                dropped: Vec::new(),
            },
        };
        self.store(entity)?;

        let schema = Arc::clone(self.registry.schema());
        let mut touched = FxHashSet::default();
        for &(relation, neighbor) in &diff.added {
            let inverse = schema.inverse(relation)?;
            if let Some(other) = self.registry.get_mut(neighbor)
                && neighbor != id
                && other.relations_mut().insert(inverse, id, class)
            {
                touched.insert(neighbor);
            }
        }
        for &(relation, neighbor) in &diff.dropped {
            let inverse = schema.inverse(relation)?;
            if let Some(other) = self.registry.get_mut(neighbor)
                && neighbor != id
                && other.relations_mut().remove(inverse, id).is_some()
            {
                touched.insert(neighbor);
            }
        }
        for &neighbor in &touched {
            self.notify_update(neighbor)?;
        }

        if cascade {
            for neighbor in diff.changed_neighbors() {
                if neighbor != id && self.registry.contains(neighbor) && !self.is_dirty(neighbor) {
                    tracing::trace!("expiring {} after its neighbor {} changed", neighbor, id);
                    self.expired.insert(neighbor);
                }
            }
        }
        Ok(())
    }

    /// Removes a resident entity the backend no longer knows, with its edges.
    fn destroy(&mut self, id: EntityId) -> Result<()> {
        let Some(entity) = self.registry.remove(id) else {
            return Ok(());
        };
        let schema = Arc::clone(self.registry.schema());
        let mut touched = Vec::new();
        for (relation, neighbor, _) in entity.relations().iter() {
            let inverse = schema.inverse(relation)?;
            if let Some(other) = self.registry.get_mut(neighbor)
                && other.relations_mut().remove(inverse, id).is_some()
            {
                touched.push(neighbor);
            }
        }
        self.buffers.forget(id);
        tracing::debug!("{} was deleted in the backend, dropped locally", id);
        for neighbor in touched {
            self.notify_update(neighbor)?;
        }
        Ok(())
    }

    /// Marks ids stale. Ids with uncommitted user changes are skipped.
    pub fn expire(&mut self, ids: &[EntityId]) {
        for &id in ids {
            if self.is_dirty(id) {
                tracing::warn!("not expiring {}: it has uncommitted changes", id);
                continue;
            }
            if self.registry.contains(id) {
                self.expired.insert(id);
            }
        }
    }

    /// Marks every resident id stale, except those with uncommitted changes.
    pub fn expire_all(&mut self) {
        let ids = self.registry.ids();
        self.expire(&ids);
    }

    /// Expires `ids`, then loads them.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load).
    pub fn refresh(&mut self, ids: &[EntityId]) -> Result<Loaded> {
        self.expire(ids);
        self.load(ids)
    }

    /// Drops every entity not reachable from the wrapper.
    ///
    /// Pruned ids also leave the expiration set and the engine buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the relation is unknown.
    pub fn prune(&mut self, relation: Option<RelationId>) -> Result<Vec<Entity>> {
        self.ensure_open()?;
        let pruned = self.registry.prune(&[], relation)?;
        for entity in &pruned {
            self.expired.remove(&entity.id());
            self.buffers.get_mut(Context::Engine).forget(entity.id());
            if self.is_dirty(entity.id()) {
                tracing::warn!("pruned {} with uncommitted changes", entity.id());
            }
        }
        Ok(pruned)
    }

    /// Returns the ids reachable from the wrapper.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the relation is unknown, and
    /// `SessionClosed` after [`close`](Self::close).
    pub fn reachable(&self, relation: Option<RelationId>) -> Result<FxHashSet<EntityId>> {
        self.ensure_open()?;
        self.registry.reachable_from(self.registry.root(), relation)
    }

    /// Drops all state and closes the backend. Closing twice does nothing.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `close` error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.registry.clear();
        self.buffers.clear();
        self.expired.clear();
        self.contexts.clear();
        self.backend.close()
    }

    /// Pulls the stored wrapper and its direct neighbors the first time a
    /// session stores anything.
    fn bootstrap(&mut self, root: EntityId) -> Result<()> {
        self.backend.initialize()?;
        let level = self.backend.load_first_level(root)?;
        if level.is_empty() {
            return Ok(());
        }
        tracing::debug!("preloading {} entities around wrapper {}", level.len(), root);
        self.with_context(Context::Engine, |session| {
            for entity in level {
                if entity.id() == root || !session.registry.contains(entity.id()) {
                    session.install(entity, false)?;
                }
            }
            Ok(())
        })
    }
}

impl<B: Backend> GraphSession for WrapperSession<B> {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    fn store(&mut self, entity: Entity) -> Result<EntityId> {
        self.ensure_open()?;
        let id = entity.id();
        let first = self.registry.is_empty() && !self.bootstrapped;
        let resident = self.registry.contains(id);
        self.registry.put(entity)?;
        self.expired.remove(&id);

        let context = self.current_context();
        let buffer = self.buffers.get_mut(context);
        if resident {
            buffer.mark_updated(id)?;
        } else {
            buffer.mark_added(id);
        }
        tracing::trace!("stored {} into the {} buffer", id, context);

        if first && self.registry.root() == Some(id) {
            self.bootstrapped = true;
            self.bootstrap(id)?;
        }
        Ok(id)
    }

    fn notify_read(&mut self, id: EntityId) -> Result<()> {
        self.ensure_open()?;
        if self.expired.contains(&id) {
            self.load(&[id])?;
        }
        Ok(())
    }

    fn notify_update(&mut self, id: EntityId) -> Result<()> {
        self.ensure_open()?;
        let context = self.current_context();
        self.buffers.get_mut(context).mark_updated(id)?;
        // dirty entities are never reloaded over
        if context == Context::User {
            self.expired.remove(&id);
        }
        Ok(())
    }

    fn notify_delete(&mut self, entity: &Entity) -> Result<()> {
        self.ensure_open()?;
        self.expired.remove(&entity.id());
        let context = self.current_context();
        self.buffers.get_mut(context).mark_deleted(entity.snapshot());
        tracing::trace!("deleted {} in the {} buffer", entity.id(), context);
        Ok(())
    }
}
