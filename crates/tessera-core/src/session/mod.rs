//! Session contract and the base, unbuffered session.
//!
//! A session owns a [`Registry`] and receives notifications around every
//! access to the entities it holds:
//!
//! - `notify_read` before an entity is read or mutated
//! - `notify_update` after an entity was mutated
//! - `notify_delete` after an entity left the registry
//!
//! The base [`Session`] ignores them. Buffering sessions use them to track
//! what changed and to reload stale entities on access.
//!
//! All entity access goes through [`Node`], obtained from
//! [`GraphSessionExt::node`].

mod edges;
mod node;

pub use node::{Foreign, Neighbor, NeighborQuery, Node, Target};

pub(crate) use edges::{link, unlink};

use crate::graph::Entity;
use crate::registry::Registry;
use std::sync::Arc;
use tessera_common::types::{EntityId, SessionId, Value};
use tessera_common::utils::error::{Error, Result};
use tessera_common::{AttributeId, ClassId, Schema};

/// Hooks and storage every session provides.
pub trait GraphSession {
    /// Returns the identity map.
    ///
    /// Reads through it skip `notify_read`, so a buffering session may hand
    /// out stale entities. Use [`Node`] to read entity state.
    fn registry(&self) -> &Registry;

    /// Returns the identity map mutably.
    ///
    /// Changes made here are not notified. Meant for session implementations
    /// and the edge and merge code, which notify around their own writes.
    fn registry_mut(&mut self) -> &mut Registry;

    /// Places an entity into the registry, replacing any resident copy.
    ///
    /// # Errors
    ///
    /// Propagates type-check and wrapper violations from the registry.
    fn store(&mut self, entity: Entity) -> Result<EntityId>;

    /// Called before an entity is read or mutated.
    fn notify_read(&mut self, id: EntityId) -> Result<()>;

    /// Called after an entity was mutated.
    fn notify_update(&mut self, id: EntityId) -> Result<()>;

    /// Called after an entity was removed from the registry.
    fn notify_delete(&mut self, entity: &Entity) -> Result<()>;
}

/// Convenience operations available on every [`GraphSession`].
pub trait GraphSessionExt: GraphSession {
    /// Returns the id of this session.
    fn session_id(&self) -> SessionId {
        self.registry().session_id()
    }

    /// Returns the schema.
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(self.registry().schema())
    }

    /// Returns the wrapper id, if a wrapper has been stored.
    fn root(&self) -> Option<EntityId> {
        self.registry().root()
    }

    /// Returns true if the entity is resident.
    fn contains(&self, id: EntityId) -> bool {
        self.registry().contains(id)
    }

    /// Returns an accessor for a resident entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity is not resident.
    fn node(&mut self, id: EntityId) -> Result<Node<'_, Self>> {
        self.registry().require(id)?;
        Ok(Node::new(self, id))
    }

    /// Returns a read-only handle other sessions can use as an `add` or
    /// `update` target.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity is not resident.
    fn share(&self, id: EntityId) -> Result<Foreign<'_>> {
        self.registry().require(id)?;
        Ok(Foreign::new(self.registry(), id))
    }

    /// Creates an entity with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown classes and bad attributes, and
    /// `WrapperViolation` if the wrapper rule would be broken.
    fn create(
        &mut self,
        class: ClassId,
        attributes: impl IntoIterator<Item = (AttributeId, Value)>,
    ) -> Result<EntityId> {
        self.create_with_id(EntityId::new(), class, attributes)
    }

    /// Creates an entity with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create), plus `InvalidArgument` if the id is
    /// already resident.
    fn create_with_id(
        &mut self,
        id: EntityId,
        class: ClassId,
        attributes: impl IntoIterator<Item = (AttributeId, Value)>,
    ) -> Result<EntityId> {
        if self.registry().contains(id) {
            return Err(Error::InvalidArgument(format!("{id} already exists")));
        }
        let mut entity = Entity::new(id, class);
        for (attribute, value) in attributes {
            entity.set_attribute(attribute, value);
        }
        self.store(entity)
    }
}

impl<S: GraphSession + ?Sized> GraphSessionExt for S {}

/// An unbuffered session.
///
/// Entities live only in memory; nothing is tracked or persisted.
#[derive(Debug)]
pub struct Session {
    registry: Registry,
    closed: bool,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            registry: Registry::new(schema),
            closed: false,
        }
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.registry.session_id()
    }

    /// Drops every entity and rejects further use.
    pub fn close(&mut self) {
        self.registry.clear();
        self.closed = true;
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
}

impl GraphSession for Session {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    fn store(&mut self, entity: Entity) -> Result<EntityId> {
        self.ensure_open()?;
        let id = entity.id();
        self.registry.put(entity)?;
        Ok(id)
    }

    fn notify_read(&mut self, _id: EntityId) -> Result<()> {
        self.ensure_open()
    }

    fn notify_update(&mut self, _id: EntityId) -> Result<()> {
        self.ensure_open()
    }

    fn notify_delete(&mut self, _entity: &Entity) -> Result<()> {
        self.ensure_open()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tessera_common::LogicalType;
    use tessera_common::RelationId;
    use tessera_common::schema::{ClassSpec, RelationPair, SchemaBuilder};

    /// Schema shared by the session, node and merge tests.
    pub(crate) struct Places {
        pub schema: Arc<Schema>,
        pub wrapper: ClassId,
        pub place: ClassId,
        pub country: ClassId,
        pub city: ClassId,
        pub shop: ClassId,
        pub has_child: RelationId,
        pub child_of: RelationId,
        pub has_capital: RelationId,
        pub capital_of: RelationId,
        pub near: RelationId,
        pub near_of: RelationId,
        pub name: AttributeId,
    }

    pub(crate) fn places() -> Places {
        let mut b = SchemaBuilder::new();
        let name = b.attribute("name", LogicalType::String);
        let (has_child, child_of) =
            b.relation_pair(RelationPair::new("has_child", "child_of").containment());
        let (has_capital, capital_of) = b.relation_pair(
            RelationPair::new("has_capital", "capital_of")
                .containment()
                .subrelation_of(has_child),
        );
        let (near, near_of) = b.relation_pair(RelationPair::new("near", "near_of"));
        let wrapper = b.class(ClassSpec::new("Wrapper").wrapper().default_relation(has_child));
        let place = b.class(ClassSpec::new("Place").attribute(name).default_relation(has_child));
        let country = b.class(ClassSpec::new("Country").subclass_of(place));
        let city = b.class(ClassSpec::new("City").subclass_of(place));
        let shop = b.class(ClassSpec::new("Shop").attribute(name));
        Places {
            schema: Arc::new(b.build().unwrap()),
            wrapper,
            place,
            country,
            city,
            shop,
            has_child,
            child_of,
            has_capital,
            capital_of,
            near,
            near_of,
            name,
        }
    }

    #[test]
    fn test_create_requires_wrapper_first() {
        let p = places();
        let mut session = Session::new(Arc::clone(&p.schema));

        let err = session.create(p.place, []).unwrap_err();
        assert!(matches!(err, Error::WrapperViolation(_)));

        let w = session.create(p.wrapper, []).unwrap();
        assert_eq!(session.root(), Some(w));
        assert!(matches!(
            session.create(p.wrapper, []),
            Err(Error::WrapperViolation(_))
        ));
        session.create(p.place, [(p.name, Value::from("Germany"))]).unwrap();
        assert_eq!(session.registry().len(), 2);
    }

    #[test]
    fn test_create_with_existing_id_rejected() {
        let p = places();
        let mut session = Session::new(Arc::clone(&p.schema));
        let w = session.create(p.wrapper, []).unwrap();
        assert!(matches!(
            session.create_with_id(w, p.wrapper, []),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_closed_session_rejects_use() {
        let p = places();
        let mut session = Session::new(Arc::clone(&p.schema));
        session.create(p.wrapper, []).unwrap();
        session.close();
        assert!(session.is_closed());
        assert!(session.registry().is_empty());
        assert!(matches!(session.create(p.wrapper, []), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_share_requires_resident() {
        let p = places();
        let mut session = Session::new(Arc::clone(&p.schema));
        let w = session.create(p.wrapper, []).unwrap();
        assert_eq!(session.share(w).unwrap().id(), w);
        assert!(matches!(session.share(EntityId::new()), Err(Error::NotFound(_))));
        assert!(session.node(EntityId::new()).is_err());
    }
}
