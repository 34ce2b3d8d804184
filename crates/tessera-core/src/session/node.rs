//! Entity accessor bound to a session.

use super::edges::{link, unlink};
use super::{GraphSession, GraphSessionExt};
use crate::graph::Entity;
use crate::merge::merge;
use crate::registry::Registry;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::iter::Flatten;
use std::vec;
use tessera_common::types::{EntityId, Value};
use tessera_common::utils::error::{Error, Result};
use tessera_common::utils::hash::FxHashSet;
use tessera_common::{AttributeId, ClassId, RelationId, Schema, SessionId};

/// A read-only reference to an entity held by some session.
///
/// Used as an [`add`](Node::add) or [`update`](Node::update) target. When it
/// comes from a different session than the node it is passed to, the entity
/// is copied over instead of linked directly.
#[derive(Debug, Clone, Copy)]
pub struct Foreign<'a> {
    registry: &'a Registry,
    id: EntityId,
}

impl<'a> Foreign<'a> {
    pub(crate) fn new(registry: &'a Registry, id: EntityId) -> Self {
        Self { registry, id }
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the registry the entity lives in.
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Returns the session owning the entity.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.registry.session_id()
    }
}

/// Target of an `add` or `update`.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An entity of the same session, by id.
    Local(EntityId),
    /// An entity of possibly another session.
    Foreign(Foreign<'a>),
}

impl Target<'_> {
    /// Returns the target entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Target::Local(id) => *id,
            Target::Foreign(foreign) => foreign.id,
        }
    }

    fn is_foreign_to(&self, session: SessionId) -> bool {
        matches!(self, Target::Foreign(f) if f.session_id() != session)
    }
}

impl From<EntityId> for Target<'_> {
    fn from(id: EntityId) -> Self {
        Target::Local(id)
    }
}

impl<'a> From<Foreign<'a>> for Target<'a> {
    fn from(foreign: Foreign<'a>) -> Self {
        Target::Foreign(foreign)
    }
}

/// Selects neighbors for [`Node::get`], [`Node::iter`] and [`Node::remove`].
///
/// Either an explicit list of ids or a class filter may be given, not both.
/// Relation and class filters match subrelations and subclasses.
#[derive(Debug, Clone, Default)]
pub struct NeighborQuery {
    ids: Option<Vec<EntityId>>,
    relation: Option<RelationId>,
    class: Option<ClassId>,
    with_relations: bool,
}

impl NeighborQuery {
    /// Matches every neighbor.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Looks up the given ids, one result slot per id.
    #[must_use]
    pub fn ids(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Restricts to edges under `relation` or its subrelations.
    #[must_use]
    pub fn relation(mut self, relation: RelationId) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Restricts to neighbors of `class` or its subclasses.
    #[must_use]
    pub fn class(mut self, class: ClassId) -> Self {
        self.class = Some(class);
        self
    }

    /// Reports the matching relations for each neighbor.
    #[must_use]
    pub fn with_relations(mut self) -> Self {
        self.with_relations = true;
        self
    }
}

/// A neighbor matched by a [`NeighborQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    /// Neighbor id.
    pub id: EntityId,
    /// Neighbor class, as recorded on the edge.
    pub class: ClassId,
    /// Matching relations, when requested.
    pub relations: Option<SmallVec<[RelationId; 2]>>,
}

/// Accessor for one resident entity of a session.
///
/// Every operation notifies the session: reads before, updates after.
pub struct Node<'s, S: GraphSession + ?Sized> {
    session: &'s mut S,
    id: EntityId,
}

impl<'s, S: GraphSession + ?Sized> Node<'s, S> {
    pub(crate) fn new(session: &'s mut S, id: EntityId) -> Self {
        Self { session, id }
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity class.
    pub fn class(&mut self) -> Result<ClassId> {
        self.session.notify_read(self.id)?;
        Ok(self.entity()?.class())
    }

    fn entity(&self) -> Result<&Entity> {
        self.session.registry().require(self.id)
    }

    /// Reads an attribute. Unset attributes read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the attribute is not declared on the
    /// entity's class.
    pub fn attribute(&mut self, attribute: AttributeId) -> Result<Option<Value>> {
        self.session.notify_read(self.id)?;
        let entity = self.entity()?;
        let schema = self.session.registry().schema();
        if !schema.class_attributes(entity.class())?.contains(&attribute) {
            return Err(Error::InvalidArgument(format!(
                "attribute '{}' is not declared on class '{}'",
                schema.attribute(attribute)?.name,
                schema.class(entity.class())?.name
            )));
        }
        Ok(entity.attribute(attribute).cloned())
    }

    /// Writes an attribute. `Value::Null` unsets it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for undeclared attributes or mistyped values.
    pub fn set_attribute(&mut self, attribute: AttributeId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.session.notify_read(self.id)?;
        let class = self.entity()?.class();
        self.session
            .registry()
            .schema()
            .check_value(class, attribute, &value)?;
        if let Some(entity) = self.session.registry_mut().get_mut(self.id) {
            entity.set_attribute(attribute, value);
        }
        self.session.notify_update(self.id)
    }

    /// Unsets an attribute.
    pub fn unset_attribute(&mut self, attribute: AttributeId) -> Result<()> {
        self.set_attribute(attribute, Value::Null)
    }

    /// Connects targets under `relation`, or the class default relation.
    ///
    /// Local targets are linked directly. Targets from another session are
    /// first copied into this one, together with their containment subtree.
    /// Returns the local ids of the targets, in order.
    ///
    /// All targets are validated before anything is changed.
    ///
    /// # Errors
    ///
    /// - `MissingRelation` if no relation is given and the class has no default
    /// - `DuplicateEdge` if a target is already connected under the relation,
    ///   or appears twice
    /// - `NotFound` if a local target is not resident
    pub fn add<'t>(
        &mut self,
        targets: impl IntoIterator<Item = Target<'t>>,
        relation: Option<RelationId>,
    ) -> Result<Vec<EntityId>> {
        self.session.notify_read(self.id)?;
        let schema = self.session.schema();
        let entity = self.entity()?;
        let relation = match relation {
            Some(relation) => {
                schema.relation(relation)?;
                relation
            }
            None => schema
                .default_relation(entity.class())
                .ok_or(Error::MissingRelation(entity.class()))?,
        };

        let local = self.session.session_id();
        let targets: Vec<Target<'t>> = targets.into_iter().collect();
        let mut seen = FxHashSet::default();
        for target in &targets {
            let id = target.id();
            if entity.relations().contains(relation, id) || !seen.insert(id) {
                return Err(Error::DuplicateEdge {
                    entity: self.id,
                    relation,
                    target: id,
                });
            }
            if !target.is_foreign_to(local) && !self.session.registry().contains(id) {
                return Err(Error::NotFound(id));
            }
        }

        let mut added = Vec::with_capacity(targets.len());
        for target in targets {
            let id = match target {
                Target::Foreign(foreign) if foreign.session_id() != local => {
                    merge(self.session, foreign.registry, foreign.id, Some(self.id))?
                }
                other => other.id(),
            };
            link(self.session, self.id, relation, id)?;
            added.push(id);
        }
        Ok(added)
    }

    /// Looks up neighbors.
    ///
    /// With explicit ids the result has one slot per id, `None` where the id
    /// is not a matching neighbor. Otherwise every matching neighbor is
    /// returned once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if both ids and a class filter are given, or
    /// if the relation or class is unknown.
    pub fn get(&mut self, query: &NeighborQuery) -> Result<Vec<Option<Neighbor>>> {
        self.session.notify_read(self.id)?;
        let schema = self.session.schema();
        resolve(self.entity()?, &schema, query)
    }

    /// Iterates over matching neighbors, skipping ids that did not match.
    pub fn iter(&mut self, query: &NeighborQuery) -> Result<Flatten<vec::IntoIter<Option<Neighbor>>>> {
        Ok(self.get(query)?.into_iter().flatten())
    }

    /// Removes every edge matched by the query, on both sides.
    ///
    /// Returns the number of edges removed.
    ///
    /// # Errors
    ///
    /// Returns `NothingRemoved` if the query matched no edge.
    pub fn remove(&mut self, query: &NeighborQuery) -> Result<usize> {
        let query = query.clone().with_relations();
        let matched: Vec<Neighbor> = self.iter(&query)?.collect();
        let mut removed = 0;
        for neighbor in matched {
            for relation in neighbor.relations.unwrap_or_default() {
                if unlink(self.session, self.id, relation, neighbor.id)? {
                    removed += 1;
                }
            }
        }
        if removed == 0 {
            return Err(Error::NothingRemoved);
        }
        Ok(removed)
    }

    /// Replaces direct neighbors with newer versions from another session.
    ///
    /// Each target must come from a different session and must already be a
    /// neighbor of this entity. Its subtree is merged in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for local targets or non-neighbors.
    pub fn update<'t>(&mut self, newer: impl IntoIterator<Item = Foreign<'t>>) -> Result<Vec<EntityId>> {
        self.session.notify_read(self.id)?;
        let local = self.session.session_id();
        let newer: Vec<Foreign<'t>> = newer.into_iter().collect();
        let entity = self.entity()?;
        for foreign in &newer {
            if foreign.session_id() == local {
                return Err(Error::InvalidArgument(format!(
                    "{} belongs to this session; update expects entities from another session",
                    foreign.id
                )));
            }
            if entity.relations().class_of(foreign.id).is_none() {
                return Err(Error::InvalidArgument(format!(
                    "{} is not a neighbor of {}",
                    foreign.id, self.id
                )));
            }
        }

        newer
            .into_iter()
            .map(|foreign| merge(self.session, foreign.registry, foreign.id, Some(self.id)))
            .collect()
    }

    /// Deletes the entity, detaching it from every neighbor first.
    pub fn delete(self) -> Result<()> {
        let id = self.id;
        self.session.notify_read(id)?;
        let neighbors = self.entity()?.relations().neighbor_ids();
        for &neighbor in &neighbors {
            if neighbor != id && self.session.registry().contains(neighbor) {
                self.session.notify_read(neighbor)?;
            }
        }

        let edges: Vec<(RelationId, EntityId)> = self
            .entity()?
            .relations()
            .iter()
            .map(|(relation, target, _)| (relation, target))
            .collect();
        let schema = self.session.schema();
        let mut touched = FxHashSet::default();
        for (relation, target) in edges {
            let inverse = schema.inverse(relation)?;
            if target == id {
                continue;
            }
            if let Some(neighbor) = self.session.registry_mut().get_mut(target)
                && neighbor.relations_mut().remove(inverse, id).is_some()
            {
                touched.insert(target);
            }
        }

        let Some(entity) = self.session.registry_mut().remove(id) else {
            return Err(Error::NotFound(id));
        };
        self.session.notify_delete(&entity)?;
        for target in touched {
            self.session.notify_update(target)?;
        }
        Ok(())
    }
}

fn resolve(entity: &Entity, schema: &Schema, query: &NeighborQuery) -> Result<Vec<Option<Neighbor>>> {
    if query.ids.is_some() && query.class.is_some() {
        return Err(Error::InvalidArgument(
            "explicit ids and a class filter cannot be combined".to_string(),
        ));
    }
    let relations = match query.relation {
        Some(relation) => Some(schema.subrelations(relation)?),
        None => None,
    };
    let classes = match query.class {
        Some(class) => Some(schema.subclasses(class)?),
        None => None,
    };
    let admits = |relation: &RelationId| relations.is_none_or(|set| set.contains(relation));
    let want = query.with_relations;

    if let Some(ids) = &query.ids {
        return Ok(ids
            .iter()
            .map(|&id| {
                let matched: SmallVec<[RelationId; 2]> = entity
                    .relations()
                    .relations_to(id)
                    .into_iter()
                    .filter(|r| admits(r))
                    .collect();
                let class = entity.relations().class_of(id)?;
                (!matched.is_empty()).then(|| Neighbor {
                    id,
                    class,
                    relations: want.then_some(matched),
                })
            })
            .collect());
    }

    let mut found: IndexMap<EntityId, (ClassId, SmallVec<[RelationId; 2]>)> = IndexMap::new();
    for (relation, target, class) in entity.relations().iter() {
        if !admits(&relation) || classes.is_some_and(|set| !set.contains(&class)) {
            continue;
        }
        found
            .entry(target)
            .or_insert_with(|| (class, SmallVec::new()))
            .1
            .push(relation);
    }
    Ok(found
        .into_iter()
        .map(|(id, (class, mut relations))| {
            relations.sort_unstable();
            Some(Neighbor {
                id,
                class,
                relations: want.then_some(relations),
            })
        })
        .collect())
}
