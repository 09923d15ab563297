//! # keel-db-backends
//!
//! Database backend implementations for keel. Each backend implements the
//! [`Connection`](keel_db::Connection) trait from `keel-db` and is compiled in
//! behind a cargo feature.
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`, enabled by default)
//! - `PostgreSQL` (feature `postgres`)
//!
//! Use [`connect`] to open whichever backend a
//! [`DatabaseSettings`](keel_core::DatabaseSettings) entry names.

// These clippy lints are intentionally allowed for the backends crate:
// - doc_markdown: backtick requirements for documentation items are too strict
// - cast_possible_truncation: rusqlite reports affected rows as usize
// - significant_drop_tightening: false positives with async Mutex guards
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::significant_drop_tightening)]

pub mod base;
#[cfg(feature = "postgres")]
pub mod postgresql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::{connect, DatabaseConfig};
#[cfg(feature = "postgres")]
pub use postgresql::{PostgresBackend, PostgresTransaction};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteTransaction};
