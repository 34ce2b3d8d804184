//! Dirty-entity bookkeeping.

use super::Context;
use indexmap::{IndexMap, IndexSet};
use tessera_common::types::EntityId;
use tessera_common::utils::error::{Error, Result};
use tessera_core::Entity;

/// Where an id currently sits in a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// Created since the last drain.
    Added,
    /// Modified since the last drain.
    Updated,
    /// Deleted since the last drain.
    Deleted,
}

/// One context's dirty set, partitioned into added, updated and deleted.
///
/// An id is in at most one partition. Added and updated entries are ids
/// whose current state lives in the session registry; deleted entries keep
/// the snapshot taken when the entity left the registry.
#[derive(Debug, Default)]
pub struct Buffer {
    added: IndexSet<EntityId>,
    updated: IndexSet<EntityId>,
    deleted: IndexMap<EntityId, Entity>,
}

impl Buffer {
    /// Records a newly stored entity.
    ///
    /// An id pending deletion is revived as an update instead, since the
    /// backend still holds it.
    pub fn mark_added(&mut self, id: EntityId) {
        if self.undelete(id) {
            self.updated.insert(id);
        } else if !self.updated.contains(&id) {
            self.added.insert(id);
        }
    }

    /// Records a modification. Added and updated ids stay where they are.
    ///
    /// # Errors
    ///
    /// Returns `DeletedObjectMutation` if the id is pending deletion.
    pub fn mark_updated(&mut self, id: EntityId) -> Result<()> {
        if self.deleted.contains_key(&id) {
            return Err(Error::DeletedObjectMutation(id));
        }
        if !self.added.contains(&id) {
            self.updated.insert(id);
        }
        Ok(())
    }

    /// Records a deletion.
    ///
    /// An id added since the last drain disappears entirely; otherwise the
    /// snapshot is kept for the backend.
    pub fn mark_deleted(&mut self, entity: Entity) {
        let id = entity.id();
        if self.added.shift_remove(&id) {
            return;
        }
        self.updated.shift_remove(&id);
        self.deleted.insert(id, entity);
    }

    /// Cancels a pending deletion. Returns `true` if there was one.
    pub fn undelete(&mut self, id: EntityId) -> bool {
        self.deleted.shift_remove(&id).is_some()
    }

    /// Drops an id from every partition.
    pub fn forget(&mut self, id: EntityId) {
        self.added.shift_remove(&id);
        self.updated.shift_remove(&id);
        self.deleted.shift_remove(&id);
    }

    /// Returns the partition holding `id`.
    #[must_use]
    pub fn pending(&self, id: EntityId) -> Option<Pending> {
        if self.added.contains(&id) {
            Some(Pending::Added)
        } else if self.updated.contains(&id) {
            Some(Pending::Updated)
        } else if self.deleted.contains_key(&id) {
            Some(Pending::Deleted)
        } else {
            None
        }
    }

    /// Returns true if `id` is in any partition.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.pending(id).is_some()
    }

    /// Returns true if `id` is pending deletion.
    #[must_use]
    pub fn is_deleted(&self, id: EntityId) -> bool {
        self.deleted.contains_key(&id)
    }

    /// Returns the added ids in insertion order.
    #[must_use]
    pub fn added(&self) -> &IndexSet<EntityId> {
        &self.added
    }

    /// Returns the updated ids in insertion order.
    #[must_use]
    pub fn updated(&self) -> &IndexSet<EntityId> {
        &self.updated
    }

    /// Returns the deleted snapshots in deletion order.
    #[must_use]
    pub fn deleted(&self) -> &IndexMap<EntityId, Entity> {
        &self.deleted
    }

    /// Returns the total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every partition.
    pub fn clear(&mut self) {
        self.added.clear();
        self.updated.clear();
        self.deleted.clear();
    }

    /// Moves the contents out, leaving the buffer empty.
    pub fn take(&mut self) -> Buffer {
        std::mem::take(self)
    }

    /// Consumes the buffer into its three partitions.
    #[must_use]
    pub fn into_parts(self) -> (IndexSet<EntityId>, IndexSet<EntityId>, IndexMap<EntityId, Entity>) {
        (self.added, self.updated, self.deleted)
    }
}

/// The user and engine buffers of one session.
#[derive(Debug, Default)]
pub(crate) struct Buffers {
    user: Buffer,
    engine: Buffer,
}

impl Buffers {
    pub(crate) fn get(&self, context: Context) -> &Buffer {
        match context {
            Context::User => &self.user,
            Context::Engine => &self.engine,
        }
    }

    pub(crate) fn get_mut(&mut self, context: Context) -> &mut Buffer {
        match context {
            Context::User => &mut self.user,
            Context::Engine => &mut self.engine,
        }
    }

    pub(crate) fn forget(&mut self, id: EntityId) {
        self.user.forget(id);
        self.engine.forget(id);
    }

    pub(crate) fn clear(&mut self) {
        self.user.clear();
        self.engine.clear();
    }
}
