//! WAL log file management.

use super::WalRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tessera_common::utils::error::{Error, Result};

/// How hard a commit pushes its records towards the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Flush and fsync on every commit.
    #[default]
    Sync,
    /// Flush the write buffer only.
    NoSync,
}

/// Manages the Write-Ahead Log.
pub struct WalManager {
    /// Path to the WAL file.
    path: PathBuf,
    /// Writer for appending records.
    writer: Mutex<Option<BufWriter<File>>>,
    /// Number of records written.
    record_count: Mutex<u64>,
    durability: DurabilityMode,
}

impl WalManager {
    /// Opens or creates a WAL file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: impl AsRef<Path>, durability: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            record_count: Mutex::new(0),
            durability,
        })
    }

    /// Logs a record to the WAL.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn log(&self, record: &WalRecord) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| Error::Internal("WAL writer not available".to_string()))?;

        let data = bincode::serde::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;

        // length prefix, payload, checksum
        let len = data.len() as u32;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&data)?;
        let checksum = crc32fast::hash(&data);
        writer.write_all(&checksum.to_le_bytes())?;

        *self.record_count.lock() += 1;

        Ok(())
    }

    /// Makes logged records durable according to the configured mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    pub fn commit_point(&self) -> Result<()> {
        match self.durability {
            DurabilityMode::Sync => self.sync(),
            DurabilityMode::NoSync => self.flush(),
        }
    }

    /// Flushes the WAL to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Syncs the WAL to disk (fsync).
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Syncs and releases the file. Later writes fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> Result<()> {
        self.sync()?;
        self.writer.lock().take();
        Ok(())
    }

    /// Returns the number of records written since opening.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        *self.record_count.lock()
    }

    /// Returns the durability mode.
    #[must_use]
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// Returns the path to the WAL file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
