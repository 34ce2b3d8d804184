//! Cross-session clone-and-repair.
//!
//! [`merge`] copies an entity and its containment subtree from another
//! session's registry into a target session, reusing any copies the target
//! already holds. Attribute values and containment edges are taken from the
//! source. Other edges are reconciled against the target's previous version:
//!
//! - edges present in both versions are kept
//! - new edges are connected if the neighbor is resident in the target, and
//!   otherwise resolved once the whole subtree has been copied
//! - dropped parent edges are kept, since the source may simply not know
//!   about the target's wider graph
//! - other dropped edges are removed from the neighbor as well
//!
//! Containment children the source only knows by id are not copied, but
//! if the target holds them they get their parent edge mirrored.
//!
//! The source registry is only read. Every target-side entity is read
//! through the target's notification hooks before it is written, so a
//! buffering target reloads stale neighbors first instead of after.

use crate::graph::Entity;
use crate::registry::Registry;
use crate::session::{GraphSession, link, unlink};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tessera_common::types::EntityId;
use tessera_common::utils::error::{Error, Result};
use tessera_common::utils::hash::FxHashSet;
use tessera_common::RelationId;

/// Edge-level difference between two versions of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborDiff {
    /// Edges only in the newer version.
    pub added: Vec<(RelationId, EntityId)>,
    /// Edges only in the older version.
    pub dropped: Vec<(RelationId, EntityId)>,
}

impl NeighborDiff {
    /// Returns the distinct neighbor ids whose connection changed.
    #[must_use]
    pub fn changed_neighbors(&self) -> FxHashSet<EntityId> {
        self.added
            .iter()
            .chain(&self.dropped)
            .map(|&(_, id)| id)
            .collect()
    }

    /// Returns true if both versions have the same edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.dropped.is_empty()
    }
}

/// Compares the edges of two versions of an entity.
#[must_use]
pub fn neighbor_diff(old: &Entity, new: &Entity) -> NeighborDiff {
    let added = new
        .relations()
        .iter()
        .filter(|&(r, id, _)| !old.relations().contains(r, id))
        .map(|(r, id, _)| (r, id))
        .collect();
    let dropped = old
        .relations()
        .iter()
        .filter(|&(r, id, _)| !new.relations().contains(r, id))
        .map(|(r, id, _)| (r, id))
        .collect();
    NeighborDiff { added, dropped }
}

/// Copies `root` and its containment subtree from `source` into `target`.
///
/// `parent` is the target-side entity the root is being attached to, if
/// any; a containment edge it already holds towards the root is mirrored
/// on the copy. Returns the root id, which is preserved.
///
/// # Errors
///
/// Returns `NotFound` if the root is not in `source`, and propagates
/// errors from the target's store and notification hooks.
pub fn merge<S: GraphSession + ?Sized>(
    target: &mut S,
    source: &Registry,
    root: EntityId,
    parent: Option<EntityId>,
) -> Result<EntityId> {
    if !source.contains(root) {
        return Err(Error::NotFound(root));
    }
    let schema = Arc::clone(target.registry().schema());

    let mut queue = VecDeque::from([(parent, root)]);
    let mut visited = FxHashSet::default();
    visited.insert(root);
    // unresolved neighbor -> (entity, relation) edges waiting for it
    let mut missing: IndexMap<EntityId, Vec<(EntityId, RelationId)>> = IndexMap::new();

    while let Some((parent, id)) = queue.pop_front() {
        let Some(new) = source.get(id) else {
            continue;
        };
        if target.registry().contains(id) {
            target.notify_read(id)?;
        }
        let old = target.registry().get(id).map(Entity::snapshot);

        let mut fresh = new.materialize();
        for (relation, child, class) in new.relations().iter() {
            if schema.is_containment(relation) {
                fresh.relations_mut().insert(relation, child, class);
            }
        }
        if let Some(old) = &old {
            for (relation, neighbor, class) in old.relations().iter() {
                if schema.is_containment(relation) {
                    continue;
                }
                if new.relations().contains(relation, neighbor) || schema.is_parent(relation) {
                    fresh.relations_mut().insert(relation, neighbor, class);
                }
            }
        }
        target.store(fresh)?;

        let diff = match &old {
            Some(old) => neighbor_diff(old, new),
            None => NeighborDiff {
                added: new.relations().iter().map(|(r, n, _)| (r, n)).collect(),
                dropped: Vec::new(),
            },
        };

        for &(relation, neighbor) in &diff.added {
            if schema.is_containment(relation) {
                continue;
            }
            if target.registry().contains(neighbor) {
                link(target, id, relation, neighbor)?;
            } else {
                missing.entry(neighbor).or_default().push((id, relation));
            }
        }

        for &(relation, neighbor) in &diff.dropped {
            if schema.is_parent(relation) {
                continue;
            }
            // the copy no longer holds this edge; clear the mirror side
            unlink(target, id, relation, neighbor)?;
        }

        if let Some(parent) = parent {
            repair_parent(target, parent, id)?;
        }

        for (relation, child, _) in new.relations().iter() {
            if !schema.is_containment(relation) {
                continue;
            }
            if source.contains(child) {
                if visited.insert(child) {
                    queue.push_back((Some(id), child));
                }
            } else if target.registry().contains(child) {
                // lazy in the source but resident here
                link(target, id, relation, child)?;
            }
        }
    }

    tracing::debug!(
        "merged {} entities under {}, {} unresolved neighbors",
        visited.len(),
        root,
        missing.len()
    );
    for (neighbor, edges) in missing {
        let resolved = target.registry().contains(neighbor);
        for (entity, relation) in edges {
            if resolved {
                link(target, entity, relation, neighbor)?;
            } else {
                unlink(target, entity, relation, neighbor)?;
            }
        }
    }

    Ok(root)
}

/// Mirrors containment edges `parent` already holds towards `child`.
fn repair_parent<S: GraphSession + ?Sized>(target: &mut S, parent: EntityId, child: EntityId) -> Result<()> {
    if !target.registry().contains(parent) {
        return Ok(());
    }
    target.notify_read(parent)?;
    let Some(holder) = target.registry().get(parent) else {
        return Ok(());
    };
    let schema = target.registry().schema();
    let relations: Vec<RelationId> = holder
        .relations()
        .relations_to(child)
        .into_iter()
        .filter(|r| schema.is_containment(*r))
        .collect();
    for relation in relations {
        link(target, parent, relation, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{Places, places};
    use crate::session::{GraphSessionExt, NeighborQuery, Session, Target};
    use std::sync::Arc;
    use tessera_common::types::Value;

    fn tree(p: &Places) -> (Session, EntityId, EntityId, EntityId) {
        let mut s = Session::new(Arc::clone(&p.schema));
        let w = s.create(p.wrapper, []).unwrap();
        let de = s.create(p.country, [(p.name, Value::from("Germany"))]).unwrap();
        let fr = s.create(p.city, [(p.name, Value::from("Freiburg"))]).unwrap();
        s.node(w).unwrap().add([Target::Local(de)], None).unwrap();
        s.node(de).unwrap().add([Target::Local(fr)], None).unwrap();
        (s, w, de, fr)
    }

    /// Builds a second session holding the same graph under the same ids.
    fn replica(p: &Places, from: &Session, w: EntityId) -> Session {
        let mut s = Session::new(Arc::clone(&p.schema));
        merge(&mut s, from.registry(), w, None).unwrap();
        s
    }

    #[test]
    fn test_neighbor_diff() {
        let p = places();
        let (a, b, c) = (EntityId::new(), EntityId::new(), EntityId::new());
        let old = Entity::new(a, p.city)
            .with_edge(p.near, b, p.city)
            .with_edge(p.child_of, c, p.country);
        let new = Entity::new(a, p.city)
            .with_edge(p.near, c, p.country)
            .with_edge(p.child_of, c, p.country);

        let diff = neighbor_diff(&old, &new);
        assert_eq!(diff.added, vec![(p.near, c)]);
        assert_eq!(diff.dropped, vec![(p.near, b)]);
        assert_eq!(diff.changed_neighbors().len(), 2);
        assert!(neighbor_diff(&old, &old).is_empty());
    }

    #[test]
    fn test_merge_into_empty_session() {
        let p = places();
        let (s1, w, de, fr) = tree(&p);
        let s2 = replica(&p, &s1, w);

        assert_eq!(s2.root(), Some(w));
        assert_eq!(s2.registry().len(), 3);
        for id in [w, de, fr] {
            assert_eq!(s2.registry().get(id), s1.registry().get(id));
        }
    }

    #[test]
    fn test_merge_missing_root() {
        let p = places();
        let (s1, ..) = tree(&p);
        let mut s2 = Session::new(Arc::clone(&p.schema));
        assert!(matches!(
            merge(&mut s2, s1.registry(), EntityId::new(), None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_merge_updates_attributes_and_children() {
        let p = places();
        let (mut s1, w, de, fr) = tree(&p);
        let mut s2 = replica(&p, &s1, w);

        s1.node(de).unwrap().set_attribute(p.name, "Deutschland").unwrap();
        let bonn = s1.create(p.city, [(p.name, Value::from("Bonn"))]).unwrap();
        s1.node(de).unwrap().add([Target::Local(bonn)], None).unwrap();
        s1.node(de).unwrap().remove(&NeighborQuery::ids([fr])).unwrap();

        let shared = s1.share(de).unwrap();
        s2.node(w).unwrap().update([shared]).unwrap();

        let reg = s2.registry();
        let copy = reg.get(de).unwrap();
        assert_eq!(copy.attribute(p.name), Some(&Value::from("Deutschland")));
        assert!(copy.relations().contains(p.has_child, bonn));
        assert!(copy.relations().contains(p.child_of, w));
        assert!(!copy.relations().contains(p.has_child, fr));
        assert!(reg.get(bonn).unwrap().relations().contains(p.child_of, de));
        // the dropped child's pointer back to the copy is cleared
        assert!(!reg.get(fr).unwrap().relations().contains(p.child_of, de));
    }

    #[test]
    fn test_merge_keeps_parent_edges_unknown_to_source() {
        let p = places();
        let (s1, w, de, fr) = tree(&p);
        let mut s2 = replica(&p, &s1, w);

        // s2 additionally files Freiburg under a second parent
        let region = s2.create(p.place, [(p.name, Value::from("Baden"))]).unwrap();
        s2.node(w).unwrap().add([Target::Local(region)], None).unwrap();
        s2.node(region).unwrap().add([Target::Local(fr)], None).unwrap();

        let shared = s1.share(de).unwrap();
        s2.node(w).unwrap().update([shared]).unwrap();

        let fr2 = s2.registry().get(fr).unwrap();
        assert!(fr2.relations().contains(p.child_of, region));
        assert!(fr2.relations().contains(p.child_of, de));
        assert!(s2.registry().get(region).unwrap().relations().contains(p.has_child, fr));
    }

    #[test]
    fn test_merge_drops_plain_edges_on_both_sides() {
        let p = places();
        let (mut s1, w, de, fr) = tree(&p);
        s1.node(fr).unwrap().add([Target::Local(de)], Some(p.near)).unwrap();
        let mut s2 = replica(&p, &s1, w);
        assert!(s2.registry().get(de).unwrap().relations().contains(p.near_of, fr));

        s1.node(fr).unwrap().remove(&NeighborQuery::all().relation(p.near)).unwrap();
        let shared = s1.share(fr).unwrap();
        s2.node(de).unwrap().update([shared]).unwrap();

        assert!(!s2.registry().get(fr).unwrap().relations().contains(p.near, de));
        assert!(!s2.registry().get(de).unwrap().relations().contains(p.near_of, fr));
    }

    #[test]
    fn test_merge_resolves_edges_within_subtree() {
        let p = places();
        let (mut s1, w, de, fr) = tree(&p);
        let bonn = s1.create(p.city, []).unwrap();
        s1.node(de).unwrap().add([Target::Local(bonn)], None).unwrap();
        // sibling edge between two nodes copied in the same merge
        s1.node(fr).unwrap().add([Target::Local(bonn)], Some(p.near)).unwrap();

        let mut s2 = Session::new(Arc::clone(&p.schema));
        let w2 = s2.create(p.wrapper, []).unwrap();
        let shared = s1.share(de).unwrap();
        s2.node(w2).unwrap().add([Target::from(shared)], None).unwrap();

        let reg = s2.registry();
        assert!(reg.get(fr).unwrap().relations().contains(p.near, bonn));
        assert!(reg.get(bonn).unwrap().relations().contains(p.near_of, fr));
        // foreign wrapper was never resident, so its edge is gone
        assert!(!reg.get(de).unwrap().relations().contains(p.child_of, w));
        assert!(reg.get(de).unwrap().relations().contains(p.child_of, w2));
    }

    #[test]
    fn test_merge_mirrors_children_lazy_in_source() {
        let p = places();
        let (s1, w, de, fr) = tree(&p);
        let mut s2 = replica(&p, &s1, w);
        let mut s1 = replica(&p, &s1, w);
        // s1 keeps the edge to Freiburg without holding Freiburg itself
        s1.registry_mut().remove(fr);

        s2.node(de).unwrap().remove(&NeighborQuery::ids([fr])).unwrap();
        assert!(s2.registry().get(fr).unwrap().relations().is_empty());

        let shared = s1.share(de).unwrap();
        s2.node(w).unwrap().update([shared]).unwrap();

        let reg = s2.registry();
        assert!(reg.get(de).unwrap().relations().contains(p.has_child, fr));
        assert!(reg.get(fr).unwrap().relations().contains(p.child_of, de));
    }
}
