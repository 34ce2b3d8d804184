//! # tessera-engine
//!
//! The main entry point for Tessera: the buffering session that keeps an
//! in-memory graph synchronized with a backend, lazily consumed query
//! results, and database lifecycle management.
//!
//! ## Modules
//!
//! - [`database`] - TesseraDB struct and lifecycle management
//! - [`session`] - WrapperSession, buffers and contexts
//! - [`config`] - Configuration options
//! - [`result`] - Replayable query results

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod database;
pub mod result;
pub mod session;

pub use config::Config;
pub use database::TesseraDB;
pub use result::QueryResult;
pub use session::{Buffer, Context, Loaded, Pending, WrapperSession};
