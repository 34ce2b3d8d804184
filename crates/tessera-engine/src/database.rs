//! TesseraDB main database struct.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use tessera_adapters::storage::{MemoryStore, StoreBackend, StoreConfig};
use tessera_common::Schema;
use tessera_common::utils::error::{Result, StorageError};
use tessera_core::Backend;

use crate::config::Config;
use crate::session::WrapperSession;

/// The main Tessera database.
///
/// Owns the committed store and hands out [`WrapperSession`]s over it. Every
/// session sees the same committed state; uncommitted changes stay private
/// to the session that made them.
pub struct TesseraDB {
    /// Database configuration.
    config: Config,
    /// Schema shared by every session.
    schema: Arc<Schema>,
    /// Committed entities.
    store: MemoryStore,
    /// Whether the database is open.
    is_open: RwLock<bool>,
}

impl TesseraDB {
    /// Creates a new in-memory database.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use tessera_common::{Schema, SchemaBuilder};
    /// use tessera_engine::TesseraDB;
    ///
    /// let schema: Arc<Schema> = Arc::new(SchemaBuilder::new().build().unwrap());
    /// let db = TesseraDB::new_in_memory(schema);
    /// let _session = db.session().unwrap();
    /// ```
    #[must_use]
    pub fn new_in_memory(schema: Arc<Schema>) -> Self {
        Self {
            config: Config::in_memory(),
            schema,
            store: MemoryStore::new(),
            is_open: RwLock::new(true),
        }
    }

    /// Opens or creates a database at the given path.
    ///
    /// If the directory holds a write-ahead log, committed transactions are
    /// replayed from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>, schema: Arc<Schema>) -> Result<Self> {
        Self::with_config(Config::persistent(path), schema)
    }

    /// Creates a database with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be created or recovery fails.
    pub fn with_config(config: Config, schema: Arc<Schema>) -> Result<Self> {
        let store = match &config.path {
            Some(path) if config.wal_enabled => MemoryStore::persistent(path, config.durability)?,
            _ => MemoryStore::new(),
        };
        tracing::debug!(
            "opened database with {} entities (durable: {})",
            store.len(),
            store.is_durable()
        );
        Ok(Self {
            config,
            schema,
            store,
            is_open: RwLock::new(true),
        })
    }

    /// Creates a new session over the database.
    ///
    /// # Errors
    ///
    /// Returns `Storage(Closed)` once the database has been closed.
    pub fn session(&self) -> Result<WrapperSession<StoreBackend>> {
        if !*self.is_open.read() {
            return Err(StorageError::Closed.into());
        }
        let backend = StoreBackend::open(&StoreConfig::new(self.store.clone()))?;
        Ok(WrapperSession::new(Arc::clone(&self.schema), backend)
            .with_expire_on_commit(self.config.expire_on_commit))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Returns the number of committed entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Closes the database, syncing the log if there is one.
    ///
    /// Sessions still holding a backend fail on their next backend call.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be synced.
    pub fn close(&self) -> Result<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.store.close()?;
        *is_open = false;
        Ok(())
    }
}

impl Drop for TesseraDB {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Error closing database: {}", e);
        }
    }
}
