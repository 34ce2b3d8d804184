//! Database configuration.

use std::path::{Path, PathBuf};

use tessera_adapters::storage::wal::DurabilityMode;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the write-ahead log. `None` for in-memory databases.
    pub path: Option<PathBuf>,
    /// Whether committed transactions are logged to disk.
    pub wal_enabled: bool,
    /// How hard the log pushes each commit to disk.
    pub durability: DurabilityMode,
    /// Whether sessions expire the entities they just committed.
    pub expire_on_commit: bool,
}

impl Config {
    /// Configuration for a volatile, in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            wal_enabled: false,
            durability: DurabilityMode::default(),
            expire_on_commit: true,
        }
    }

    /// Configuration for a database logged under `path`.
    #[must_use]
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            wal_enabled: true,
            ..Self::in_memory()
        }
    }

    /// Sets the durability mode.
    #[must_use]
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Sets whether sessions expire committed entities.
    #[must_use]
    pub fn with_expire_on_commit(mut self, expire: bool) -> Self {
        self.expire_on_commit = expire;
        self
    }

    /// Disables the write-ahead log, even if a path is set.
    #[must_use]
    pub fn without_wal(mut self) -> Self {
        self.wal_enabled = false;
        self
    }

    /// Returns true if the configuration leads to a durable store.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.wal_enabled && self.path.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::in_memory()
    }
}
