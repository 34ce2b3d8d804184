//! Hash map and set aliases.
//!
//! All in-memory maps keyed by identifiers go through these aliases so the
//! hasher can be swapped in one place.

use std::hash::BuildHasherDefault;

/// Hasher builder used by the map aliases.
pub type FxBuildHasher = BuildHasherDefault<ahash::AHasher>;

/// A `hashbrown` map with the fast non-cryptographic hasher.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// A `hashbrown` set with the fast non-cryptographic hasher.
pub type FxHashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;
