//! # tessera-adapters
//!
//! Storage adapters for Tessera.
//!
//! ## Modules
//!
//! - [`storage`] - Shared in-memory store, the transactional [`StoreBackend`]
//!   and the write-ahead log
//!
//! [`StoreBackend`]: storage::StoreBackend

#![warn(missing_docs)]

pub mod storage;
