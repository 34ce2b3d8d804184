//! Storage backends.
//!
//! A [`MemoryStore`] holds committed entities and is shared by every session
//! opened on it. Each session talks to it through its own [`StoreBackend`],
//! which stages writes per transaction. A store opened with a path logs
//! committed transactions to a [`wal`] and replays them on reopen.

mod backend;
mod memory;
pub mod wal;

pub use backend::{StoreBackend, StoreConfig};
pub use memory::MemoryStore;
