//! Bidirectional edge maintenance.
//!
//! Every edge `a -[r]-> b` is mirrored as `b -[inverse(r)]-> a`. These helpers
//! are the only place that writes both sides.

use super::GraphSession;
use tessera_common::types::EntityId;
use tessera_common::utils::error::Result;
use tessera_common::RelationId;

/// Connects two resident entities, notifying reads before and updates after.
///
/// Returns `true` if the forward edge was new.
pub(crate) fn link<S: GraphSession + ?Sized>(
    session: &mut S,
    source: EntityId,
    relation: RelationId,
    target: EntityId,
) -> Result<bool> {
    session.notify_read(source)?;
    if target != source && session.registry().contains(target) {
        session.notify_read(target)?;
    }
    attach(session, source, relation, target)
}

/// Disconnects two entities, notifying reads before and updates after.
///
/// Returns `true` if the forward edge existed.
pub(crate) fn unlink<S: GraphSession + ?Sized>(
    session: &mut S,
    source: EntityId,
    relation: RelationId,
    target: EntityId,
) -> Result<bool> {
    session.notify_read(source)?;
    if target != source && session.registry().contains(target) {
        session.notify_read(target)?;
    }
    detach(session, source, relation, target)
}

/// Writes both sides of an edge without read notifications.
fn attach<S: GraphSession + ?Sized>(
    session: &mut S,
    source: EntityId,
    relation: RelationId,
    target: EntityId,
) -> Result<bool> {
    let inverse = session.registry().schema().inverse(relation)?;
    let registry = session.registry();
    let source_class = registry.require(source)?.class();
    let target_class = registry.require(target)?.class();

    let registry = session.registry_mut();
    let mut changed = false;
    if let Some(entity) = registry.get_mut(source) {
        changed |= entity.relations_mut().insert(relation, target, target_class);
    }
    let mut mirrored = false;
    if let Some(entity) = registry.get_mut(target) {
        mirrored = entity.relations_mut().insert(inverse, source, source_class);
    }

    if changed {
        session.notify_update(source)?;
    }
    if mirrored && target != source {
        session.notify_update(target)?;
    }
    Ok(changed)
}

/// Removes both sides of an edge without read notifications.
///
/// Either endpoint may be absent from the registry; the side that is
/// resident is still cleaned.
fn detach<S: GraphSession + ?Sized>(
    session: &mut S,
    source: EntityId,
    relation: RelationId,
    target: EntityId,
) -> Result<bool> {
    let inverse = session.registry().schema().inverse(relation)?;
    let registry = session.registry_mut();
    let removed = registry
        .get_mut(source)
        .and_then(|entity| entity.relations_mut().remove(relation, target))
        .is_some();
    let mirrored = registry
        .get_mut(target)
        .and_then(|entity| entity.relations_mut().remove(inverse, source))
        .is_some();

    if removed {
        session.notify_update(source)?;
    }
    if mirrored && target != source {
        session.notify_update(target)?;
    }
    Ok(removed)
}
