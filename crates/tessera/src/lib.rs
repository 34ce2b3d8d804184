//! # Tessera
//!
//! A typed, relationship-rich object graph kept in memory and synchronized
//! with pluggable backends.
//!
//! Start with [`TesseraDB`]: it owns the committed store and hands out
//! [`WrapperSession`]s. A session holds one wrapper entity and everything
//! reachable from it. Changes are buffered per session until
//! [`commit`](WrapperSession::commit); committed entities are reloaded
//! lazily the next time they are touched.
//!
//! Entities are reached through [`Node`] handles. Adding an entity from
//! another session copies it, with its containment subtree, into the
//! receiving session.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera::{ClassSpec, GraphSessionExt, LogicalType, RelationPair, SchemaBuilder, Target, TesseraDB, Value};
//!
//! let mut b = SchemaBuilder::new();
//! let name = b.attribute("name", LogicalType::String);
//! let (has_child, _) = b.relation_pair(RelationPair::new("has_child", "child_of").containment());
//! let wrapper = b.class(ClassSpec::new("Wrapper").wrapper().default_relation(has_child));
//! let city = b.class(ClassSpec::new("City").attribute(name));
//!
//! let db = TesseraDB::new_in_memory(Arc::new(b.build()?));
//! let mut session = db.session()?;
//! let root = session.create(wrapper, [])?;
//! let freiburg = session.create(city, [(name, Value::from("Freiburg"))])?;
//! session.node(root)?.add([Target::Local(freiburg)], None)?;
//! session.commit()?;
//!
//! assert_eq!(db.entity_count(), 2);
//! # Ok::<(), tessera::Error>(())
//! ```

// Re-export the main database API
pub use tessera_engine::{
    Buffer, Config, Context, Loaded, Pending, QueryResult, TesseraDB, WrapperSession,
};

// Re-export the object model - you'll need these for working with entities
pub use tessera_core::{
    Backend, Entity, Foreign, GraphSession, GraphSessionExt, Neighbor, NeighborQuery, Node,
    Registry, Relations, Session, Target, merge,
};

// Re-export schema and value types
pub use tessera_common::schema::{ClassSpec, RelationPair};
pub use tessera_common::{
    AttributeId, ClassId, EntityId, LogicalType, RelationId, Schema, SchemaBuilder, SessionId,
    Value,
};

// Errors
pub use tessera_common::utils::error::{Error, Result};

// Storage
pub use tessera_adapters::storage::wal::DurabilityMode;
pub use tessera_adapters::storage::{MemoryStore, StoreBackend, StoreConfig};
