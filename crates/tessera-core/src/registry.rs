//! Per-session identity map.
//!
//! The [`Registry`] owns every entity resident in a session, keyed by id, and
//! remembers which one is the session's wrapper (root). It is the only way
//! to turn an [`EntityId`] into an [`Entity`] inside that session.

use crate::graph::Entity;
use std::collections::VecDeque;
use std::sync::Arc;
use tessera_common::types::{EntityId, SessionId, Value};
use tessera_common::utils::error::{Error, Result};
use tessera_common::utils::hash::{FxHashMap, FxHashSet};
use tessera_common::{AttributeId, ClassId, RelationId, Schema};

/// Identity map of one session.
#[derive(Debug)]
pub struct Registry {
    session: SessionId,
    schema: Arc<Schema>,
    entities: FxHashMap<EntityId, Entity>,
    root: Option<EntityId>,
}

impl Registry {
    /// Creates an empty registry with a fresh session id.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_session(SessionId::new(), schema)
    }

    /// Creates an empty registry owned by `session`.
    #[must_use]
    pub fn with_session(session: SessionId, schema: Arc<Schema>) -> Self {
        Self {
            session,
            schema,
            entities: FxHashMap::default(),
            root: None,
        }
    }

    /// Returns the id of the owning session.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the wrapper entity id, if one has been stored.
    #[must_use]
    pub fn root(&self) -> Option<EntityId> {
        self.root
    }

    /// Stores an entity, replacing any resident entity with the same id.
    ///
    /// The entity is type-checked against the schema and the wrapper rule is
    /// enforced: the first entity stored must be a wrapper, and there is only
    /// ever one wrapper per registry. Returns the replaced entity, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown classes, relations or
    /// attributes and for mistyped values, and `WrapperViolation` if the
    /// wrapper rule would be broken.
    pub fn put(&mut self, entity: Entity) -> Result<Option<Entity>> {
        self.type_check(&entity)?;
        if self.admit(&entity)? {
            self.root = Some(entity.id());
        }
        Ok(self.entities.insert(entity.id(), entity))
    }

    fn type_check(&self, entity: &Entity) -> Result<()> {
        let schema = &self.schema;
        schema.class(entity.class())?;
        for (&attribute, value) in entity.attributes() {
            schema.check_value(entity.class(), attribute, value)?;
        }
        for (relation, _, class) in entity.relations().iter() {
            schema.relation(relation)?;
            schema.class(class)?;
        }
        Ok(())
    }

    fn admit(&self, entity: &Entity) -> Result<bool> {
        let is_wrapper = self.schema.is_wrapper(entity.class());
        match self.root {
            Some(root) if root == entity.id() => Ok(false),
            Some(root) if is_wrapper => Err(Error::WrapperViolation(format!(
                "session already has wrapper {root}, cannot store wrapper {}",
                entity.id()
            ))),
            Some(_) => Ok(false),
            None if is_wrapper && self.entities.is_empty() => Ok(true),
            None if is_wrapper => Err(Error::WrapperViolation(format!(
                "wrapper {} must be the first entity of the session",
                entity.id()
            ))),
            None => Err(Error::WrapperViolation(format!(
                "{} stored before any wrapper",
                entity.id()
            ))),
        }
    }

    /// Returns a resident entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns a resident entity mutably.
    ///
    /// Changes made through this reference bypass type checks and session
    /// notifications.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns a resident entity or `NotFound`.
    pub fn require(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(Error::NotFound(id))
    }

    /// Removes an entity, clearing the root if it was the wrapper.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if self.root == Some(id) {
            self.root = None;
        }
        self.entities.remove(&id)
    }

    /// Returns true if the entity is resident.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the number of resident entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over resident entities in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Returns the resident ids.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Drops every entity and the root.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.root = None;
    }

    /// Returns the ids reachable from `roots` by following edges.
    ///
    /// With a relation, only edges under that relation (or its subrelations)
    /// are followed. Neighbors that are not resident terminate the walk but
    /// are still reported, since they are referenced. Roots that are not
    /// resident are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the relation is unknown.
    pub fn reachable_from(
        &self,
        roots: impl IntoIterator<Item = EntityId>,
        relation: Option<RelationId>,
    ) -> Result<FxHashSet<EntityId>> {
        let follow = match relation {
            Some(r) => Some(self.schema.subrelations(r)?),
            None => None,
        };

        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<EntityId> = roots
            .into_iter()
            .filter(|id| self.contains(*id))
            .collect();
        seen.extend(queue.iter().copied());

        while let Some(id) = queue.pop_front() {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            for (r, next, _) in entity.relations().iter() {
                if follow.is_some_and(|set| !set.contains(&r)) {
                    continue;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(seen)
    }

    /// Removes every entity not reachable from `roots` and returns them.
    ///
    /// With no roots, the wrapper is used. With neither, nothing is pruned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the relation is unknown.
    pub fn prune(&mut self, roots: &[EntityId], relation: Option<RelationId>) -> Result<Vec<Entity>> {
        let roots: Vec<EntityId> = if roots.is_empty() {
            self.root.into_iter().collect()
        } else {
            roots.to_vec()
        };
        if roots.is_empty() {
            return Ok(Vec::new());
        }
        let keep = self.reachable_from(roots, relation)?;
        let doomed: Vec<EntityId> = self
            .entities
            .keys()
            .filter(|id| !keep.contains(*id))
            .copied()
            .collect();
        Ok(doomed.into_iter().filter_map(|id| self.remove(id)).collect())
    }

    /// Returns the entities matching a predicate.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<&Entity>
    where
        F: FnMut(&Entity) -> bool,
    {
        self.entities.values().filter(|e| predicate(e)).collect()
    }

    /// Returns the entities of `class`, optionally including its subclasses.
    pub fn filter_by_class(&self, class: ClassId, include_subclasses: bool) -> Vec<&Entity> {
        self.filter(|e| {
            if include_subclasses {
                self.schema.is_subclass(e.class(), class)
            } else {
                e.class() == class
            }
        })
    }

    /// Returns the entities whose `attribute` equals `value`.
    pub fn filter_by_attribute(&self, attribute: AttributeId, value: &Value) -> Vec<&Entity> {
        self.filter(|e| e.attribute(attribute) == Some(value))
    }

    /// Returns the entities holding at least one edge under `relation`,
    /// optionally counting its subrelations.
    pub fn filter_by_relation(&self, relation: RelationId, include_subrelations: bool) -> Vec<&Entity> {
        self.filter(|e| {
            if include_subrelations {
                e.relations().count_under(&self.schema, relation) > 0
            } else {
                e.relations().get(relation).is_some()
            }
        })
    }
}
