//! Class, relation and attribute descriptors.
//!
//! A [`Schema`] is immutable once built and shared between sessions behind an
//! `Arc`. Entities refer to it only through the small copyable ids defined
//! here, so an entity can move between sessions without carrying any schema
//! state with it.
//!
//! Relations always come in inverse pairs. A pair marked as *containment*
//! makes its forward side the parent-to-child ownership relation used by
//! recursive traversal and merging; the inverse side is then a *parent*
//! relation. Everything else is a *plain* relation.

mod builder;

pub use builder::{ClassSpec, RelationPair, SchemaBuilder};

use crate::types::{LogicalType, Value};
use crate::utils::error::{Error, Result};
use crate::utils::hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! schema_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from its raw index.
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw index.
            #[must_use]
            pub const fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

schema_id!(
    /// Identifies a class in a [`Schema`].
    ClassId,
    "class#"
);
schema_id!(
    /// Identifies a relation in a [`Schema`].
    RelationId,
    "relation#"
);
schema_id!(
    /// Identifies an attribute in a [`Schema`].
    AttributeId,
    "attribute#"
);

/// Declared attribute.
#[derive(Debug, Clone)]
pub struct AttributeDef {
    /// Attribute name.
    pub name: Arc<str>,
    /// Declared value type.
    pub logical_type: LogicalType,
}

/// Declared relation (one side of an inverse pair).
#[derive(Debug, Clone)]
pub struct RelationDef {
    /// Relation name.
    pub name: Arc<str>,
    /// The other side of the pair.
    pub inverse: RelationId,
    /// Direct superrelation, if any.
    pub superrelation: Option<RelationId>,
    /// Whether this side is a containment (parent-to-child) relation.
    pub containment: bool,
}

/// Bounds on the number of edges an entity holds under a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    /// Constrained relation (subrelations are counted too).
    pub relation: RelationId,
    /// Minimum number of edges.
    pub min: usize,
    /// Maximum number of edges, `None` for unbounded.
    pub max: Option<usize>,
}

impl Cardinality {
    /// Returns true if `count` lies within the bounds.
    #[must_use]
    pub fn admits(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

/// Declared class.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class name.
    pub name: Arc<str>,
    /// Direct superclass, if any.
    pub superclass: Option<ClassId>,
    /// Attributes declared on this class (not including inherited ones).
    pub attributes: Vec<AttributeId>,
    /// Relation used by `add` when none is given.
    pub default_relation: Option<RelationId>,
    /// Whether instances are session wrappers (roots).
    pub wrapper: bool,
    /// Cardinality constraints declared on this class.
    pub constraints: Vec<Cardinality>,
}

/// An immutable, fully resolved schema.
#[derive(Debug)]
pub struct Schema {
    classes: Vec<ClassDef>,
    relations: Vec<RelationDef>,
    attributes: Vec<AttributeDef>,
    subclasses: Vec<FxHashSet<ClassId>>,
    subrelations: Vec<FxHashSet<RelationId>>,
    class_attributes: Vec<FxHashSet<AttributeId>>,
    class_constraints: Vec<Vec<Cardinality>>,
    wrapper: Vec<bool>,
    class_names: FxHashMap<Arc<str>, ClassId>,
    relation_names: FxHashMap<Arc<str>, RelationId>,
    attribute_names: FxHashMap<Arc<str>, AttributeId>,
}

impl Schema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the class definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id does not belong to this schema.
    pub fn class(&self, id: ClassId) -> Result<&ClassDef> {
        self.classes
            .get(id.index())
            .ok_or_else(|| Error::InvalidArgument(format!("{id} is not a class of this schema")))
    }

    /// Returns the relation definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id does not belong to this schema.
    pub fn relation(&self, id: RelationId) -> Result<&RelationDef> {
        self.relations.get(id.index()).ok_or_else(|| {
            Error::InvalidArgument(format!("{id} is not a relation of this schema"))
        })
    }

    /// Returns the attribute definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id does not belong to this schema.
    pub fn attribute(&self, id: AttributeId) -> Result<&AttributeDef> {
        self.attributes.get(id.index()).ok_or_else(|| {
            Error::InvalidArgument(format!("{id} is not an attribute of this schema"))
        })
    }

    /// Returns the inverse of a relation.
    pub fn inverse(&self, id: RelationId) -> Result<RelationId> {
        Ok(self.relation(id)?.inverse)
    }

    /// Returns true if `id` is a containment (parent-to-child) relation.
    #[must_use]
    pub fn is_containment(&self, id: RelationId) -> bool {
        self.relations.get(id.index()).is_some_and(|r| r.containment)
    }

    /// Returns true if `id` points from a child to its parent.
    #[must_use]
    pub fn is_parent(&self, id: RelationId) -> bool {
        self.relations
            .get(id.index())
            .is_some_and(|r| self.is_containment(r.inverse))
    }

    /// Returns the reflexive subclass set of a class.
    pub fn subclasses(&self, id: ClassId) -> Result<&FxHashSet<ClassId>> {
        self.class(id)?;
        Ok(&self.subclasses[id.index()])
    }

    /// Returns true if `class` is `ancestor` or one of its subclasses.
    #[must_use]
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.subclasses
            .get(ancestor.index())
            .is_some_and(|set| set.contains(&class))
    }

    /// Returns the reflexive subrelation set of a relation.
    pub fn subrelations(&self, id: RelationId) -> Result<&FxHashSet<RelationId>> {
        self.relation(id)?;
        Ok(&self.subrelations[id.index()])
    }

    /// Returns true if `relation` is `ancestor` or one of its subrelations.
    #[must_use]
    pub fn is_subrelation(&self, relation: RelationId, ancestor: RelationId) -> bool {
        self.subrelations
            .get(ancestor.index())
            .is_some_and(|set| set.contains(&relation))
    }

    /// Returns the attributes of a class, including inherited ones.
    pub fn class_attributes(&self, id: ClassId) -> Result<&FxHashSet<AttributeId>> {
        self.class(id)?;
        Ok(&self.class_attributes[id.index()])
    }

    /// Returns the cardinality constraints of a class, including inherited ones.
    pub fn constraints(&self, id: ClassId) -> Result<&[Cardinality]> {
        self.class(id)?;
        Ok(&self.class_constraints[id.index()])
    }

    /// Returns true if instances of the class are wrappers.
    #[must_use]
    pub fn is_wrapper(&self, id: ClassId) -> bool {
        self.wrapper.get(id.index()).copied().unwrap_or(false)
    }

    /// Returns the default relation of a class, walking up superclasses.
    #[must_use]
    pub fn default_relation(&self, id: ClassId) -> Option<RelationId> {
        let mut current = Some(id);
        while let Some(class) = current.and_then(|c| self.classes.get(c.index())) {
            if class.default_relation.is_some() {
                return class.default_relation;
            }
            current = class.superclass;
        }
        None
    }

    /// Checks that `value` may be stored under `attribute` on an instance of `class`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the attribute is not declared for the class
    /// or the value has the wrong type.
    pub fn check_value(&self, class: ClassId, attribute: AttributeId, value: &Value) -> Result<()> {
        let def = self.attribute(attribute)?;
        if !self.class_attributes(class)?.contains(&attribute) {
            return Err(Error::InvalidArgument(format!(
                "attribute '{}' is not declared on class '{}'",
                def.name,
                self.class(class)?.name
            )));
        }
        if !def.logical_type.accepts(value) {
            return Err(Error::InvalidArgument(format!(
                "attribute '{}' expects {}, got {}",
                def.name,
                def.logical_type,
                value.type_name()
            )));
        }
        Ok(())
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Looks up a relation by name.
    #[must_use]
    pub fn relation_by_name(&self, name: &str) -> Option<RelationId> {
        self.relation_names.get(name).copied()
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute_by_name(&self, name: &str) -> Option<AttributeId> {
        self.attribute_names.get(name).copied()
    }

    /// Returns the number of classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Returns the number of relations.
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Iterates over all relation ids.
    pub fn relation_ids(&self) -> impl Iterator<Item = RelationId> + '_ {
        (0..self.relations.len()).map(|i| RelationId::new(i as u32))
    }
}
