//! Per-entity adjacency, keyed by relation.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tessera_common::types::EntityId;
use tessera_common::utils::hash::{FxHashMap, FxHashSet};
use tessera_common::{ClassId, RelationId, Schema};

/// Outgoing edges of one entity.
///
/// Maps each relation to the neighbors reached through it, remembering the
/// neighbor's class so class filters can be answered without touching the
/// neighbor itself. Empty relation buckets are removed eagerly, so
/// [`len`](Self::len) and [`is_empty`](Self::is_empty) reflect edges only.
///
/// This is the raw structure. It does not maintain inverse edges; that is
/// the job of the session layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relations {
    edges: FxHashMap<RelationId, FxHashMap<EntityId, ClassId>>,
}

impl Relations {
    /// Creates an empty adjacency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edge. Returns `true` if it was not present before.
    pub fn insert(&mut self, relation: RelationId, target: EntityId, class: ClassId) -> bool {
        self.edges
            .entry(relation)
            .or_default()
            .insert(target, class)
            .is_none()
    }

    /// Removes an edge, returning the neighbor class it carried.
    pub fn remove(&mut self, relation: RelationId, target: EntityId) -> Option<ClassId> {
        let bucket = self.edges.get_mut(&relation)?;
        let removed = bucket.remove(&target);
        if bucket.is_empty() {
            self.edges.remove(&relation);
        }
        removed
    }

    /// Returns true if the edge exists.
    #[must_use]
    pub fn contains(&self, relation: RelationId, target: EntityId) -> bool {
        self.edges
            .get(&relation)
            .is_some_and(|bucket| bucket.contains_key(&target))
    }

    /// Returns the neighbors under exactly `relation`.
    #[must_use]
    pub fn get(&self, relation: RelationId) -> Option<&FxHashMap<EntityId, ClassId>> {
        self.edges.get(&relation)
    }

    /// Returns the class recorded for `target`, under any relation.
    #[must_use]
    pub fn class_of(&self, target: EntityId) -> Option<ClassId> {
        self.edges
            .values()
            .find_map(|bucket| bucket.get(&target).copied())
    }

    /// Iterates over all edges as `(relation, neighbor, neighbor class)`.
    pub fn iter(&self) -> impl Iterator<Item = (RelationId, EntityId, ClassId)> + '_ {
        self.edges.iter().flat_map(|(&relation, bucket)| {
            bucket
                .iter()
                .map(move |(&target, &class)| (relation, target, class))
        })
    }

    /// Returns every relation that connects to `target`.
    #[must_use]
    pub fn relations_to(&self, target: EntityId) -> SmallVec<[RelationId; 2]> {
        let mut found: SmallVec<[RelationId; 2]> = self
            .edges
            .iter()
            .filter(|(_, bucket)| bucket.contains_key(&target))
            .map(|(&relation, _)| relation)
            .collect();
        found.sort_unstable();
        found
    }

    /// Returns the distinct neighbor ids.
    #[must_use]
    pub fn neighbor_ids(&self) -> FxHashSet<EntityId> {
        self.edges
            .values()
            .flat_map(|bucket| bucket.keys().copied())
            .collect()
    }

    /// Counts edges under `relation` and all of its subrelations.
    #[must_use]
    pub fn count_under(&self, schema: &Schema, relation: RelationId) -> usize {
        self.edges
            .iter()
            .filter(|(r, _)| schema.is_subrelation(**r, relation))
            .map(|(_, bucket)| bucket.len())
            .sum()
    }

    /// Returns the total number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.values().map(|bucket| bucket.len()).sum()
    }

    /// Returns true if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Removes all edges.
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
