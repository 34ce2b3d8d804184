//! WAL record types.

use serde::{Deserialize, Serialize};
use tessera_common::types::{EntityId, TxId};
use tessera_core::Entity;

/// A record in the Write-Ahead Log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    /// Store a full entity version, replacing any previous one.
    PutEntity(Entity),

    /// Remove an entity.
    DeleteEntity {
        /// Entity ID.
        id: EntityId,
    },

    /// Transaction committed.
    TxCommit {
        /// Transaction ID.
        tx_id: TxId,
    },

    /// Transaction aborted.
    TxAbort {
        /// Transaction ID.
        tx_id: TxId,
    },
}

impl WalRecord {
    /// Returns true for commit and abort markers.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::TxCommit { .. } | Self::TxAbort { .. })
    }
}
