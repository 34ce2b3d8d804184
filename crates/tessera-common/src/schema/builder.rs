//! Schema construction.

use super::{
    AttributeDef, AttributeId, Cardinality, ClassDef, ClassId, RelationDef, RelationId, Schema,
};
use crate::types::LogicalType;
use crate::utils::error::{Error, Result};
use crate::utils::hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Declaration of an inverse relation pair.
#[derive(Debug, Clone)]
pub struct RelationPair {
    name: Arc<str>,
    inverse_name: Arc<str>,
    containment: bool,
    parent: Option<RelationId>,
}

impl RelationPair {
    /// Declares a plain pair `name` / `inverse_name`.
    pub fn new(name: impl Into<Arc<str>>, inverse_name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            inverse_name: inverse_name.into(),
            containment: false,
            parent: None,
        }
    }

    /// Marks the forward side as a containment relation.
    pub fn containment(mut self) -> Self {
        self.containment = true;
        self
    }

    /// Makes the forward side a subrelation of `parent` (and the inverse a
    /// subrelation of `parent`'s inverse).
    pub fn subrelation_of(mut self, parent: RelationId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Declaration of a class.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: Arc<str>,
    superclass: Option<ClassId>,
    attributes: Vec<AttributeId>,
    default_relation: Option<RelationId>,
    wrapper: bool,
    constraints: Vec<Cardinality>,
}

impl ClassSpec {
    /// Declares a class called `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            attributes: Vec::new(),
            default_relation: None,
            wrapper: false,
            constraints: Vec::new(),
        }
    }

    /// Sets the superclass.
    pub fn subclass_of(mut self, superclass: ClassId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Declares an attribute.
    pub fn attribute(mut self, attribute: AttributeId) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declares several attributes.
    pub fn attributes(mut self, attributes: impl IntoIterator<Item = AttributeId>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Sets the relation `add` uses when none is given.
    pub fn default_relation(mut self, relation: RelationId) -> Self {
        self.default_relation = Some(relation);
        self
    }

    /// Marks instances as session wrappers.
    pub fn wrapper(mut self) -> Self {
        self.wrapper = true;
        self
    }

    /// Adds a cardinality constraint checked on commit.
    pub fn constraint(mut self, relation: RelationId, min: usize, max: Option<usize>) -> Self {
        self.constraints.push(Cardinality { relation, min, max });
        self
    }
}

/// Incrementally declares attributes, relation pairs and classes.
///
/// Ids are handed out in declaration order, so a superclass or
/// superrelation always has to be declared before its children.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    classes: Vec<ClassDef>,
    relations: Vec<RelationDef>,
    attributes: Vec<AttributeDef>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute.
    pub fn attribute(&mut self, name: impl Into<Arc<str>>, logical_type: LogicalType) -> AttributeId {
        let id = AttributeId::new(self.attributes.len() as u32);
        self.attributes.push(AttributeDef {
            name: name.into(),
            logical_type,
        });
        id
    }

    /// Declares an inverse pair and returns `(forward, inverse)`.
    pub fn relation_pair(&mut self, pair: RelationPair) -> (RelationId, RelationId) {
        let forward = RelationId::new(self.relations.len() as u32);
        let inverse = RelationId::new(forward.0 + 1);
        let inverse_parent = pair
            .parent
            .map(|p| self.relations.get(p.index()).map_or(p, |def| def.inverse));

        self.relations.push(RelationDef {
            name: pair.name,
            inverse,
            superrelation: pair.parent,
            containment: pair.containment,
        });
        self.relations.push(RelationDef {
            name: pair.inverse_name,
            inverse: forward,
            superrelation: inverse_parent,
            containment: false,
        });
        (forward, inverse)
    }

    /// Declares a class.
    pub fn class(&mut self, spec: ClassSpec) -> ClassId {
        let id = ClassId::new(self.classes.len() as u32);
        self.classes.push(ClassDef {
            name: spec.name,
            superclass: spec.superclass,
            attributes: spec.attributes,
            default_relation: spec.default_relation,
            wrapper: spec.wrapper,
            constraints: spec.constraints,
        });
        id
    }

    /// Validates the declarations and resolves closures.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a declaration references an unknown or
    /// later-declared id, or if a name is declared twice.
    pub fn build(self) -> Result<Schema> {
        let Self {
            classes,
            relations,
            attributes,
        } = self;

        let attribute_names = index_names(attributes.iter().map(|a| &a.name), AttributeId::new, "attribute")?;
        let relation_names = index_names(relations.iter().map(|r| &r.name), RelationId::new, "relation")?;
        let class_names = index_names(classes.iter().map(|c| &c.name), ClassId::new, "class")?;

        for (i, rel) in relations.iter().enumerate() {
            if let Some(parent) = rel.superrelation {
                if parent.index() >= i {
                    return Err(Error::InvalidArgument(format!(
                        "relation '{}' must be declared after its superrelation",
                        rel.name
                    )));
                }
            }
        }

        for (i, class) in classes.iter().enumerate() {
            if let Some(parent) = class.superclass {
                if parent.index() >= i {
                    return Err(Error::InvalidArgument(format!(
                        "class '{}' must be declared after its superclass",
                        class.name
                    )));
                }
            }
            for attr in &class.attributes {
                if attr.index() >= attributes.len() {
                    return Err(Error::InvalidArgument(format!(
                        "class '{}' declares unknown {attr}",
                        class.name
                    )));
                }
            }
            let referenced = class
                .default_relation
                .into_iter()
                .chain(class.constraints.iter().map(|c| c.relation));
            for rel in referenced {
                if rel.index() >= relations.len() {
                    return Err(Error::InvalidArgument(format!(
                        "class '{}' references unknown {rel}",
                        class.name
                    )));
                }
            }
        }

        let mut subrelations: Vec<FxHashSet<RelationId>> = vec![FxHashSet::default(); relations.len()];
        for i in 0..relations.len() {
            let id = RelationId::new(i as u32);
            let mut current = Some(id);
            while let Some(ancestor) = current {
                subrelations[ancestor.index()].insert(id);
                current = relations[ancestor.index()].superrelation;
            }
        }

        let mut subclasses: Vec<FxHashSet<ClassId>> = vec![FxHashSet::default(); classes.len()];
        let mut class_attributes: Vec<FxHashSet<AttributeId>> = Vec::with_capacity(classes.len());
        let mut class_constraints: Vec<Vec<Cardinality>> = Vec::with_capacity(classes.len());
        let mut wrapper = Vec::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            let id = ClassId::new(i as u32);
            let mut current = Some(id);
            while let Some(ancestor) = current {
                subclasses[ancestor.index()].insert(id);
                current = classes[ancestor.index()].superclass;
            }

            // Superclasses precede subclasses, so their closures are final.
            let (mut attrs, mut constraints, inherited_wrapper) = match class.superclass {
                Some(parent) => (
                    class_attributes[parent.index()].clone(),
                    class_constraints[parent.index()].clone(),
                    wrapper[parent.index()],
                ),
                None => (FxHashSet::default(), Vec::new(), false),
            };
            attrs.extend(class.attributes.iter().copied());
            constraints.extend(class.constraints.iter().copied());
            class_attributes.push(attrs);
            class_constraints.push(constraints);
            wrapper.push(inherited_wrapper || class.wrapper);
        }

        Ok(Schema {
            classes,
            relations,
            attributes,
            subclasses,
            subrelations,
            class_attributes,
            class_constraints,
            wrapper,
            class_names,
            relation_names,
            attribute_names,
        })
    }
}

fn index_names<'a, Id: Copy>(
    names: impl Iterator<Item = &'a Arc<str>>,
    make_id: fn(u32) -> Id,
    kind: &str,
) -> Result<FxHashMap<Arc<str>, Id>> {
    let mut index = FxHashMap::default();
    for (i, name) in names.enumerate() {
        if index.insert(Arc::clone(name), make_id(i as u32)).is_some() {
            return Err(Error::InvalidArgument(format!("{kind} '{name}' declared twice")));
        }
    }
    Ok(index)
}
