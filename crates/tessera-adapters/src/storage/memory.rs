//! Shared committed-state store.

use super::wal::{DurabilityMode, WalManager, WalRecord, WalRecovery};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tessera_common::types::{EntityId, TxId};
use tessera_common::utils::error::{Result, StorageError};
use tessera_common::utils::hash::FxHashMap;
use tessera_core::Entity;

/// WAL file name inside a store directory.
const WAL_FILE: &str = "tessera.wal";

#[derive(Default)]
struct StoreState {
    entities: FxHashMap<EntityId, Entity>,
    closed: bool,
}

struct StoreInner {
    state: RwLock<StoreState>,
    wal: Option<WalManager>,
    next_tx: AtomicU64,
}

/// Committed entities shared by every session opened on the store.
///
/// Cloning a `MemoryStore` yields another handle to the same data. Writes
/// arrive as whole transactions through [`commit`](Self::commit); when the
/// store has a WAL, each transaction is logged before it becomes visible.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Creates an empty, volatile store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                wal: None,
                next_tx: AtomicU64::new(1),
            }),
        }
    }

    /// Opens a durable store in `dir`, replaying its WAL if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or WAL cannot be created or read.
    pub fn persistent(dir: impl AsRef<Path>, durability: DurabilityMode) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let wal_path = dir.join(WAL_FILE);

        let mut state = StoreState::default();
        let mut last_tx = 0;
        if wal_path.exists() {
            let records = WalRecovery::new(&wal_path).recover()?;
            tracing::debug!("replaying {} WAL records from {}", records.len(), wal_path.display());
            for record in records {
                match record {
                    WalRecord::PutEntity(entity) => {
                        state.entities.insert(entity.id(), entity);
                    }
                    WalRecord::DeleteEntity { id } => {
                        state.entities.remove(&id);
                    }
                    WalRecord::TxCommit { tx_id } | WalRecord::TxAbort { tx_id } => {
                        last_tx = last_tx.max(tx_id.as_u64());
                    }
                }
            }
        }

        let wal = WalManager::open(&wal_path, durability)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                wal: Some(wal),
                next_tx: AtomicU64::new(last_tx + 1),
            }),
        })
    }

    /// Allocates a transaction id.
    pub fn next_tx_id(&self) -> TxId {
        TxId::new(self.inner.next_tx.fetch_add(1, Ordering::Relaxed))
    }

    /// Applies one transaction: every put, then every delete.
    ///
    /// With a WAL, the records and a commit marker are logged and made
    /// durable before the in-memory state changes. If logging fails midway
    /// an abort marker is attempted and nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns `Storage(Closed)` after [`close`](Self::close), or the WAL
    /// error that prevented the commit.
    pub fn commit(&self, tx_id: TxId, puts: Vec<Entity>, deletes: Vec<EntityId>) -> Result<()> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Err(StorageError::Closed.into());
        }

        if let Some(wal) = &self.inner.wal
            && let Err(e) = Self::log_transaction(wal, tx_id, &puts, &deletes)
        {
            if let Err(abort) = wal.log(&WalRecord::TxAbort { tx_id }) {
                tracing::warn!("Failed to log TxAbort for {}: {}", tx_id, abort);
            }
            return Err(e);
        }

        for entity in puts {
            state.entities.insert(entity.id(), entity);
        }
        for id in deletes {
            state.entities.remove(&id);
        }
        Ok(())
    }

    fn log_transaction(wal: &WalManager, tx_id: TxId, puts: &[Entity], deletes: &[EntityId]) -> Result<()> {
        for entity in puts {
            wal.log(&WalRecord::PutEntity(entity.snapshot()))?;
        }
        for &id in deletes {
            wal.log(&WalRecord::DeleteEntity { id })?;
        }
        wal.log(&WalRecord::TxCommit { tx_id })?;
        wal.commit_point()
    }

    /// Returns a copy of a committed entity.
    ///
    /// # Errors
    ///
    /// Returns `Storage(Closed)` after [`close`](Self::close).
    pub fn get(&self, id: EntityId) -> Result<Option<Entity>> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(StorageError::Closed.into());
        }
        Ok(state.entities.get(&id).map(Entity::snapshot))
    }

    /// Returns copies of several committed entities, one slot per id.
    ///
    /// # Errors
    ///
    /// Returns `Storage(Closed)` after [`close`](Self::close).
    pub fn get_many(&self, ids: &[EntityId]) -> Result<Vec<Option<Entity>>> {
        let state = self.inner.state.read();
        if state.closed {
            return Err(StorageError::Closed.into());
        }
        Ok(ids
            .iter()
            .map(|id| state.entities.get(id).map(Entity::snapshot))
            .collect())
    }

    /// Returns true if the entity is committed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.state.read().entities.contains_key(&id)
    }

    /// Returns the number of committed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.read().entities.len()
    }

    /// Returns true if nothing is committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().entities.is_empty()
    }

    /// Returns true if the store logs to a WAL.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.inner.wal.is_some()
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    /// Syncs the WAL and rejects further reads and writes.
    ///
    /// Closing an already closed store does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the final WAL sync fails.
    pub fn close(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Ok(());
        }
        if let Some(wal) = &self.inner.wal {
            wal.close()?;
        }
        state.closed = true;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entities", &self.len())
            .field("durable", &self.is_durable())
            .finish()
    }
}
