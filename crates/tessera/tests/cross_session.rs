//! Copying entities between sessions and keeping both sides of edges in step.

mod common;

use std::sync::Arc;

use common::{Geo, geo};
use proptest::prelude::*;
use tessera::{
    EntityId, Error, GraphSession, GraphSessionExt, NeighborQuery, Session, Target, TesseraDB,
    Value,
};

/// A country with its capital under a wrapper.
fn germany(g: &Geo, s: &mut impl GraphSession) -> (EntityId, EntityId, EntityId) {
    let w = s.create(g.wrapper, []).unwrap();
    let de = s.create(g.country, [(g.name, Value::from("Germany"))]).unwrap();
    let berlin = s.create(g.city, [(g.name, Value::from("Berlin"))]).unwrap();
    s.node(w).unwrap().add([Target::Local(de)], None).unwrap();
    s.node(de)
        .unwrap()
        .add([Target::Local(berlin)], Some(g.has_capital))
        .unwrap();
    (w, de, berlin)
}

fn neighbors(s: &mut impl GraphSession, id: EntityId) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = s
        .node(id)
        .unwrap()
        .iter(&NeighborQuery::all())
        .unwrap()
        .map(|n| n.id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn copy_brings_containment_subtree() {
    let g = geo();
    let db = TesseraDB::new_in_memory(Arc::clone(&g.schema));
    let mut s1 = db.session().unwrap();
    let (_, de, berlin) = germany(&g, &mut s1);

    let mut s2 = db.session().unwrap();
    let w2 = s2.create(g.wrapper, []).unwrap();
    let copied = s2
        .node(w2)
        .unwrap()
        .add([Target::from(s1.share(de).unwrap())], None)
        .unwrap();
    assert_eq!(copied, vec![de]);

    let capital = s2
        .node(de)
        .unwrap()
        .get(&NeighborQuery::ids([berlin]).relation(g.has_child))
        .unwrap();
    let capital = capital[0].as_ref().unwrap();
    assert_eq!(capital.id, berlin);
    assert_eq!(capital.class, g.city);
    assert!(s2.contains(berlin));

    // the copy hangs off the new wrapper only
    let parents: Vec<EntityId> = s2
        .node(de)
        .unwrap()
        .iter(&NeighborQuery::all().relation(g.child_of))
        .unwrap()
        .map(|n| n.id)
        .collect();
    assert_eq!(parents, vec![w2]);
    assert!(s2.is_dirty(de) && s2.is_dirty(berlin));
}

#[test]
fn copy_is_detached_until_update() {
    let g = geo();
    let db = TesseraDB::new_in_memory(Arc::clone(&g.schema));
    let mut s1 = db.session().unwrap();
    let (_, de, _) = germany(&g, &mut s1);

    let mut s2 = db.session().unwrap();
    let w2 = s2.create(g.wrapper, []).unwrap();
    s2.node(w2)
        .unwrap()
        .add([Target::from(s1.share(de).unwrap())], None)
        .unwrap();

    s1.node(de).unwrap().set_attribute(g.name, "Deutschland").unwrap();
    assert_eq!(
        s2.node(de).unwrap().attribute(g.name).unwrap(),
        Some(Value::from("Germany"))
    );

    let updated = s2.node(w2).unwrap().update([s1.share(de).unwrap()]).unwrap();
    assert_eq!(updated, vec![de]);
    assert_eq!(
        s2.node(de).unwrap().attribute(g.name).unwrap(),
        Some(Value::from("Deutschland"))
    );
    // the parent edge towards the local wrapper survives the update
    let parent = s2
        .node(de)
        .unwrap()
        .get(&NeighborQuery::ids([w2]).relation(g.child_of))
        .unwrap();
    assert!(parent[0].is_some());
}

#[test]
fn update_rejects_local_and_unrelated_targets() {
    let g = geo();
    let db = TesseraDB::new_in_memory(Arc::clone(&g.schema));
    let mut s1 = db.session().unwrap();
    let (w1, de, _) = germany(&g, &mut s1);

    let mut s2 = db.session().unwrap();
    let w2 = s2.create(g.wrapper, []).unwrap();
    let err = s2.node(w2).unwrap().update([s1.share(de).unwrap()]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let mut s3 = Session::new(Arc::clone(&g.schema));
    let w3 = s3.create(g.wrapper, []).unwrap();
    let err = s1.node(w1).unwrap().update([s3.share(w3).unwrap()]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn add_validates_before_changing_anything() {
    let g = geo();
    let mut s = Session::new(Arc::clone(&g.schema));
    let (_, de, berlin) = germany(&g, &mut s);

    let err = s
        .node(de)
        .unwrap()
        .add([Target::Local(berlin)], Some(g.has_capital))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateEdge { .. }));

    let ghost = EntityId::new();
    let before = neighbors(&mut s, de);
    let err = s
        .node(de)
        .unwrap()
        .add([Target::Local(ghost)], Some(g.near))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(id) if id == ghost));
    assert_eq!(neighbors(&mut s, de), before);
}

proptest! {
    #[test]
    fn add_and_remove_keep_both_sides(
        n in 2usize..6,
        pick in (0usize..6, 0usize..6),
        containment in any::<bool>(),
    ) {
        let (i, j) = (pick.0 % n, pick.1 % n);
        prop_assume!(i != j);

        let g = geo();
        let mut s = Session::new(Arc::clone(&g.schema));
        s.create(g.wrapper, []).unwrap();
        let ids: Vec<EntityId> = (0..n)
            .map(|k| s.create(g.city, [(g.name, Value::from(format!("c{k}")))]).unwrap())
            .collect();
        let (x, y) = (ids[i], ids[j]);
        let (relation, inverse) = if containment {
            (g.has_child, g.child_of)
        } else {
            (g.near, g.near_of)
        };

        s.node(x).unwrap().add([Target::Local(y)], Some(relation)).unwrap();
        let back = s.node(y).unwrap().get(&NeighborQuery::ids([x]).relation(inverse)).unwrap();
        prop_assert_eq!(back.len(), 1);
        prop_assert_eq!(back[0].as_ref().map(|n| n.id), Some(x));

        let removed = s.node(x).unwrap().remove(&NeighborQuery::ids([y]).relation(relation)).unwrap();
        prop_assert_eq!(removed, 1);
        prop_assert!(s.node(x).unwrap().get(&NeighborQuery::ids([y])).unwrap()[0].is_none());
        prop_assert!(s.node(y).unwrap().get(&NeighborQuery::ids([x])).unwrap()[0].is_none());

        let again = s.node(x).unwrap().remove(&NeighborQuery::ids([y]).relation(relation));
        prop_assert!(matches!(again, Err(Error::NothingRemoved)));
    }

    #[test]
    fn get_is_positional(
        linked in prop::collection::vec(any::<bool>(), 1..8),
        picks in prop::collection::vec(0usize..10, 0..12),
    ) {
        let g = geo();
        let mut s = Session::new(Arc::clone(&g.schema));
        s.create(g.wrapper, []).unwrap();
        let center = s.create(g.city, [(g.name, Value::from("center"))]).unwrap();
        let others: Vec<EntityId> = linked
            .iter()
            .map(|_| s.create(g.city, []).unwrap())
            .collect();
        let neighbors: Vec<EntityId> = others
            .iter()
            .zip(&linked)
            .filter(|&(_, &l)| l)
            .map(|(&id, _)| id)
            .collect();
        let targets: Vec<Target<'_>> = neighbors.iter().map(|&id| Target::Local(id)).collect();
        if !targets.is_empty() {
            s.node(center).unwrap().add(targets, Some(g.near)).unwrap();
        }

        // indexes past the candidates stand for ids that were never created
        let strangers: Vec<EntityId> = (0..10).map(|_| EntityId::new()).collect();
        let query: Vec<EntityId> = picks
            .iter()
            .map(|&k| others.get(k).copied().unwrap_or(strangers[k]))
            .collect();

        let got = s.node(center).unwrap().get(&NeighborQuery::ids(query.clone())).unwrap();
        prop_assert_eq!(got.len(), query.len());
        for (slot, id) in got.iter().zip(&query) {
            match slot {
                Some(n) => {
                    prop_assert_eq!(n.id, *id);
                    prop_assert!(neighbors.contains(id));
                }
                None => prop_assert!(!neighbors.contains(id)),
            }
        }

        let mut all: Vec<EntityId> = s
            .node(center)
            .unwrap()
            .iter(&NeighborQuery::all())
            .unwrap()
            .map(|n| n.id)
            .collect();
        let mut expected = neighbors.clone();
        all.sort();
        expected.sort();
        prop_assert_eq!(all, expected);
    }
}
