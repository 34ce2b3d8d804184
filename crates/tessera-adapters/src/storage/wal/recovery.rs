//! WAL recovery.

use super::WalRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tessera_common::utils::error::{Error, Result, StorageError};

/// Handles WAL recovery after a restart or crash.
pub struct WalRecovery {
    /// Path to the WAL file.
    path: PathBuf,
}

impl WalRecovery {
    /// Creates a new recovery handler for the given WAL file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Recovers committed records from the WAL.
    ///
    /// Returns only records that were part of committed transactions,
    /// including their commit markers. Reading stops at the first corrupted
    /// or truncated frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn recover(&self) -> Result<Vec<WalRecord>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let mut current_tx_records = Vec::new();
        let mut committed_records = Vec::new();

        loop {
            match Self::read_record(&mut reader) {
                Ok(Some(record)) => match &record {
                    WalRecord::TxCommit { .. } => {
                        committed_records.append(&mut current_tx_records);
                        committed_records.push(record);
                    }
                    WalRecord::TxAbort { .. } => {
                        current_tx_records.clear();
                    }
                    _ => {
                        current_tx_records.push(record);
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("WAL corruption detected: {}", e);
                    break;
                }
            }
        }

        if !current_tx_records.is_empty() {
            tracing::debug!(
                "discarding {} uncommitted WAL records",
                current_tx_records.len()
            );
        }

        Ok(committed_records)
    }

    fn read_record<R: Read>(reader: &mut R) -> Result<Option<WalRecord>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let mut checksum_buf = [0u8; 4];
        reader.read_exact(&mut checksum_buf)?;
        let stored_checksum = u32::from_le_bytes(checksum_buf);
        let computed_checksum = crc32fast::hash(&data);

        if stored_checksum != computed_checksum {
            return Err(Error::Storage(StorageError::Corruption(
                "WAL checksum mismatch".to_string(),
            )));
        }

        let (record, _): (WalRecord, _) =
            bincode::serde::decode_from_slice(&data, bincode::config::standard())
                .map_err(|e| Error::Serialization(e.to_string()))?;

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::{DurabilityMode, WalManager};
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::tempdir;
    use tessera_common::types::{EntityId, TxId, Value};
    use tessera_common::{AttributeId, ClassId, RelationId};
    use tessera_core::Entity;

    fn sample_entity() -> Entity {
        Entity::new(EntityId::new(), ClassId::new(2))
            .with_attribute(AttributeId::new(0), "Freiburg")
            .with_attribute(AttributeId::new(1), Value::from(vec![Value::from(1i64)]))
            .with_edge(RelationId::new(1), EntityId::new(), ClassId::new(1))
    }

    #[test]
    fn test_recovery_committed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let entity = sample_entity();

        {
            let wal = WalManager::open(&path, DurabilityMode::Sync).unwrap();
            wal.log(&WalRecord::PutEntity(entity.clone())).unwrap();
            wal.log(&WalRecord::TxCommit { tx_id: TxId::new(1) }).unwrap();
            wal.flush().unwrap();
        }

        let records = WalRecovery::new(&path).recover().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], WalRecord::PutEntity(entity));
    }

    #[test]
    fn test_recovery_uncommitted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");

        {
            let wal = WalManager::open(&path, DurabilityMode::NoSync).unwrap();
            wal.log(&WalRecord::PutEntity(sample_entity())).unwrap();
            wal.log(&WalRecord::TxAbort { tx_id: TxId::new(1) }).unwrap();
            wal.log(&WalRecord::DeleteEntity { id: EntityId::new() }).unwrap();
            // No commit!
            wal.flush().unwrap();
        }

        let records = WalRecovery::new(&path).recover().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_recovery_stops_at_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");

        {
            let wal = WalManager::open(&path, DurabilityMode::Sync).unwrap();
            wal.log(&WalRecord::DeleteEntity { id: EntityId::new() }).unwrap();
            wal.log(&WalRecord::TxCommit { tx_id: TxId::new(1) }).unwrap();
            wal.sync().unwrap();
        }
        {
            // a torn frame: length says 64 bytes, only 3 follow
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&64u32.to_le_bytes()).unwrap();
            file.write_all(&[1, 2, 3]).unwrap();
        }

        let records = WalRecovery::new(&path).recover().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_recovery_detects_checksum_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let wal = WalManager::open(&path, DurabilityMode::Sync).unwrap();
            wal.log(&WalRecord::TxCommit { tx_id: TxId::new(7) }).unwrap();
            wal.sync().unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(WalRecovery::new(&path).recover().unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_only_committed_transactions_survive(txs in prop::collection::vec((1usize..4, any::<bool>()), 0..8)) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("test.wal");
            let mut expected = 0;
            {
                let wal = WalManager::open(&path, DurabilityMode::NoSync).unwrap();
                for (i, (puts, commit)) in txs.iter().enumerate() {
                    for _ in 0..*puts {
                        wal.log(&WalRecord::DeleteEntity { id: EntityId::new() }).unwrap();
                    }
                    let tx_id = TxId::new(i as u64 + 1);
                    if *commit {
                        wal.log(&WalRecord::TxCommit { tx_id }).unwrap();
                        expected += puts + 1;
                    } else {
                        wal.log(&WalRecord::TxAbort { tx_id }).unwrap();
                    }
                }
                wal.flush().unwrap();
            }
            let records = WalRecovery::new(&path).recover().unwrap();
            prop_assert_eq!(records.len(), expected);
        }
    }
}
