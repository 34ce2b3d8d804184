//! Write-Ahead Log (WAL) for durability.
//!
//! - [`WalManager`] - appends length-prefixed, checksummed records
//! - [`WalRecovery`] - replays committed transactions after a restart
//!
//! Durability modes:
//!
//! - [`DurabilityMode::Sync`] - fsync after every commit (safest, slowest)
//! - [`DurabilityMode::NoSync`] - flush only, rely on the OS (fastest, least safe)

mod log;
mod record;
mod recovery;

pub use log::{DurabilityMode, WalManager};
pub use record::WalRecord;
pub use recovery::WalRecovery;
