//! # tribe-store
//!
//! Local storage for the Tribe chat client, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`.  The client keeps its whole state in one JSON
//! blob under a fixed key, loaded once at startup and rewritten after every
//! change.

pub mod database;
pub mod migrations;
pub mod snapshot;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use snapshot::PersistedState;
