//! # keel-migrations
//!
//! Versioned, reversible schema migrations with a transactional ledger.
//!
//! ## Overview
//!
//! - A [`Migration`] pairs a version string with a forward [`Operation`] and
//!   an optional backward one.
//! - A [`MigrationManager`] holds the registered migrations for one
//!   connection and runs [`up`](MigrationManager::up),
//!   [`down`](MigrationManager::down) and
//!   [`status`](MigrationManager::status).
//! - The [`Ledger`] is the `migrations` table recording applied versions.
//!   [`LedgerSql`] holds its SQL for each dialect.
//! - [`registry::all`] returns the migrations keel ships with.
//!
//! Versions are ordered as plain strings, so timestamp versions
//! (`20250101000003`) apply in chronological order.

// These clippy lints are intentionally allowed for the migrations crate:
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: accessors on types holding trait objects
// - result_large_err: MigrationError carries context strings
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]

pub mod dialect;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod migration;
pub mod registry;

pub use dialect::{detect_dialect, DetectedDialect, LedgerSql};
pub use error::{MigrationError, MigrationResult};
pub use ledger::{Ledger, LedgerEntry};
pub use manager::{MigrationManager, MigrationState, MigrationStatus, UpReport};
pub use migration::{DialectSql, Migration, Operation, RunSql};
