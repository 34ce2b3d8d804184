//! A typed object in the graph.

use super::Relations;
use serde::{Deserialize, Serialize};
use tessera_common::types::{EntityId, Value};
use tessera_common::utils::hash::FxHashMap;
use tessera_common::{AttributeId, ClassId, RelationId};

/// A graph object: identity, class, attribute values and adjacency.
///
/// An `Entity` value is detached data. Mutating it directly does not notify
/// any session and does not maintain inverse edges; inside a session, go
/// through [`Node`](crate::session::Node) instead. Backends build and return
/// detached entities freely.
///
/// Null attribute values are never stored: setting `Value::Null` removes the
/// attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    class: ClassId,
    attributes: FxHashMap<AttributeId, Value>,
    relations: Relations,
}

impl Entity {
    /// Creates an entity with no attributes and no edges.
    #[must_use]
    pub fn new(id: EntityId, class: ClassId) -> Self {
        Self {
            id,
            class,
            attributes: FxHashMap::default(),
            relations: Relations::new(),
        }
    }

    /// Builder-style attribute assignment.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeId, value: impl Into<Value>) -> Self {
        self.set_attribute(attribute, value.into());
        self
    }

    /// Builder-style edge insertion.
    #[must_use]
    pub fn with_edge(mut self, relation: RelationId, target: EntityId, class: ClassId) -> Self {
        self.relations.insert(relation, target, class);
        self
    }

    /// Returns the identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the class.
    #[inline]
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Returns an attribute value, if set.
    #[must_use]
    pub fn attribute(&self, attribute: AttributeId) -> Option<&Value> {
        self.attributes.get(&attribute)
    }

    /// Returns all set attributes.
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<AttributeId, Value> {
        &self.attributes
    }

    /// Sets an attribute, returning the previous value. `Null` unsets it.
    pub fn set_attribute(&mut self, attribute: AttributeId, value: Value) -> Option<Value> {
        if value.is_null() {
            self.attributes.remove(&attribute)
        } else {
            self.attributes.insert(attribute, value)
        }
    }

    /// Returns the adjacency.
    #[must_use]
    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Returns the adjacency for direct manipulation.
    pub fn relations_mut(&mut self) -> &mut Relations {
        &mut self.relations
    }

    /// Copies identity, class, attributes and edges into a new value.
    ///
    /// Fields are copied one by one rather than through a recursive clone so
    /// the copy can never reach into another session's state.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        Self {
            id: self.id,
            class: self.class,
            attributes: self.attributes.clone(),
            relations: self.relations.clone(),
        }
    }

    /// Copies identity, class and attributes, leaving the edges empty.
    #[must_use]
    pub fn materialize(&self) -> Self {
        Self {
            id: self.id,
            class: self.class,
            attributes: self.attributes.clone(),
            relations: Relations::new(),
        }
    }

    /// Drops all attribute values and edges, keeping identity and class.
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.relations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_unsets_attribute() {
        let attr = AttributeId::new(0);
        let mut e = Entity::new(EntityId::new(), ClassId::new(0)).with_attribute(attr, "x");
        assert_eq!(e.attribute(attr).and_then(Value::as_str), Some("x"));

        let old = e.set_attribute(attr, Value::Null);
        assert_eq!(old, Some(Value::from("x")));
        assert!(e.attribute(attr).is_none());
        assert!(e.attributes().is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let attr = AttributeId::new(0);
        let other = EntityId::new();
        let original = Entity::new(EntityId::new(), ClassId::new(0))
            .with_attribute(attr, 1i64)
            .with_edge(RelationId::new(0), other, ClassId::new(1));

        let mut copy = original.snapshot();
        assert_eq!(copy, original);

        copy.set_attribute(attr, Value::from(2i64));
        copy.relations_mut().remove(RelationId::new(0), other);
        assert_eq!(original.attribute(attr), Some(&Value::from(1i64)));
        assert!(original.relations().contains(RelationId::new(0), other));
    }

    #[test]
    fn test_materialize_drops_edges() {
        let e = Entity::new(EntityId::new(), ClassId::new(0))
            .with_attribute(AttributeId::new(0), true)
            .with_edge(RelationId::new(0), EntityId::new(), ClassId::new(0));
        let m = e.materialize();
        assert_eq!(m.id(), e.id());
        assert_eq!(m.attributes(), e.attributes());
        assert!(m.relations().is_empty());
    }
}
