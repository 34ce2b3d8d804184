//! Transactional [`Backend`] over a [`MemoryStore`].

use super::MemoryStore;
use indexmap::IndexMap;
use tessera_common::types::{EntityId, TxId};
use tessera_common::utils::error::{Error, Result, StorageError, TransactionError};
use tessera_common::utils::hash::FxHashSet;
use tessera_core::{Backend, Entity};

/// Connection settings for a [`StoreBackend`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store to connect to.
    pub store: MemoryStore,
}

impl StoreConfig {
    /// Connects to `store`.
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

/// Writes staged by an open transaction.
struct Staged {
    tx_id: TxId,
    puts: IndexMap<EntityId, Entity>,
    deletes: Vec<EntityId>,
}

/// One session's connection to a [`MemoryStore`].
///
/// Writes are staged per transaction and reach the store only on
/// [`commit_transaction`](Backend::commit_transaction). Reads always see
/// committed state.
pub struct StoreBackend {
    store: MemoryStore,
    tx: Option<Staged>,
    open: bool,
}

impl StoreBackend {
    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::Closed.into())
        }
    }

    fn staged(&mut self) -> Result<&mut Staged> {
        self.ensure_open()?;
        self.tx.as_mut().ok_or_else(|| {
            TransactionError::InvalidState("no transaction is open".to_string()).into()
        })
    }
}

impl Backend for StoreBackend {
    type Config = StoreConfig;

    fn open(config: &StoreConfig) -> Result<Self> {
        if config.store.is_closed() {
            return Err(StorageError::Closed.into());
        }
        Ok(Self {
            store: config.store.clone(),
            tx: None,
            open: true,
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.tx.take().is_some() {
            tracing::debug!("closing backend with an open transaction; staged writes dropped");
        }
        self.open = false;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.tx.is_some() {
            return Err(
                TransactionError::InvalidState("a transaction is already open".to_string()).into(),
            );
        }
        self.tx = Some(Staged {
            tx_id: self.store.next_tx_id(),
            puts: IndexMap::new(),
            deletes: Vec::new(),
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.staged()?;
        let Some(staged) = self.tx.take() else {
            return Err(Error::Internal("staged transaction vanished".to_string()));
        };
        tracing::debug!(
            "committing {}: {} puts, {} deletes",
            staged.tx_id,
            staged.puts.len(),
            staged.deletes.len()
        );
        self.store
            .commit(staged.tx_id, staged.puts.into_values().collect(), staged.deletes)
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let Some(staged) = self.tx.take() {
            tracing::debug!("rolling back {}", staged.tx_id);
        }
        Ok(())
    }

    fn apply_added(&mut self, entities: &[Entity]) -> Result<()> {
        let staged = self.staged()?;
        for entity in entities {
            staged.puts.insert(entity.id(), entity.snapshot());
        }
        Ok(())
    }

    fn apply_updated(&mut self, entities: &[Entity]) -> Result<()> {
        self.apply_added(entities)
    }

    fn apply_deleted(&mut self, entities: &[Entity]) -> Result<()> {
        let staged = self.staged()?;
        for entity in entities {
            staged.puts.shift_remove(&entity.id());
            staged.deletes.push(entity.id());
        }
        Ok(())
    }

    fn load_missing(
        &mut self,
        ids: &[EntityId],
        _expired: &FxHashSet<EntityId>,
    ) -> Result<Vec<Option<Entity>>> {
        self.ensure_open()?;
        self.store.get_many(ids)
    }

    fn initialize(&mut self) -> Result<()> {
        self.ensure_open()
    }

    fn load_first_level(&mut self, root: EntityId) -> Result<Vec<Entity>> {
        self.ensure_open()?;
        let Some(wrapper) = self.store.get(root)? else {
            return Ok(Vec::new());
        };
        let neighbors: Vec<EntityId> = wrapper.relations().neighbor_ids().into_iter().collect();
        let mut level = Vec::with_capacity(neighbors.len() + 1);
        level.push(wrapper);
        level.extend(self.store.get_many(&neighbors)?.into_iter().flatten());
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::{ClassId, RelationId};

    fn backend(store: &MemoryStore) -> StoreBackend {
        StoreBackend::open(&StoreConfig::new(store.clone())).unwrap()
    }

    #[test]
    fn test_writes_visible_only_after_commit() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        let e = Entity::new(EntityId::new(), ClassId::new(0));

        b.begin_transaction().unwrap();
        b.apply_added(std::slice::from_ref(&e)).unwrap();
        assert!(!store.contains(e.id()));
        b.commit_transaction().unwrap();
        assert!(store.contains(e.id()));
        assert!(!b.in_transaction());
    }

    #[test]
    fn test_rollback_discards() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        let e = Entity::new(EntityId::new(), ClassId::new(0));

        b.begin_transaction().unwrap();
        b.apply_added(std::slice::from_ref(&e)).unwrap();
        b.rollback_transaction().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_transaction_state_checked() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        assert!(matches!(
            b.commit_transaction(),
            Err(Error::Transaction(TransactionError::InvalidState(_)))
        ));
        assert!(b.apply_added(&[]).is_err());
        b.begin_transaction().unwrap();
        assert!(b.begin_transaction().is_err());
    }

    #[test]
    fn test_delete_after_put_in_same_transaction() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        let e = Entity::new(EntityId::new(), ClassId::new(0));
        b.begin_transaction().unwrap();
        b.apply_added(std::slice::from_ref(&e)).unwrap();
        b.apply_deleted(std::slice::from_ref(&e)).unwrap();
        b.commit_transaction().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_missing_is_positional() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        let e = Entity::new(EntityId::new(), ClassId::new(0));
        store.commit(TxId::new(1), vec![e.clone()], vec![]).unwrap();

        let ghost = EntityId::new();
        let got = b.load_missing(&[ghost, e.id()], &FxHashSet::default()).unwrap();
        assert_eq!(got, vec![None, Some(e)]);
    }

    #[test]
    fn test_load_first_level() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        let (w, a) = (EntityId::new(), EntityId::new());
        let wrapper = Entity::new(w, ClassId::new(0)).with_edge(RelationId::new(0), a, ClassId::new(1));
        let child = Entity::new(a, ClassId::new(1)).with_edge(RelationId::new(1), w, ClassId::new(0));
        store.commit(TxId::new(1), vec![wrapper.clone(), child.clone()], vec![]).unwrap();

        let level = b.load_first_level(w).unwrap();
        assert_eq!(level, vec![wrapper, child]);
        assert!(b.load_first_level(EntityId::new()).unwrap().is_empty());
    }

    #[test]
    fn test_closed_backend() {
        let store = MemoryStore::new();
        let mut b = backend(&store);
        b.close().unwrap();
        b.close().unwrap();
        assert!(matches!(b.initialize(), Err(Error::Storage(StorageError::Closed))));

        store.close().unwrap();
        assert!(StoreBackend::open(&StoreConfig::new(store)).is_err());
    }
}
