//! # keel
//!
//! Versioned, reversible schema migrations for SQLite and PostgreSQL.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on `keel`
//! to get everything, or on the individual crates for finer-grained control.
//!
//! ```rust,no_run
//! use keel::db::Dialect;
//! use keel::migrations::{Migration, MigrationManager, RunSql};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = keel::core::settings_loader::from_toml_file_with_env("keel.toml")?;
//! let conn = keel::db_backends::connect(settings.database("default")?).await?;
//!
//! let mut manager = MigrationManager::new(conn, Dialect::Sqlite);
//! manager.register(
//!     Migration::new("20250101000001", "create_users", RunSql::new("CREATE TABLE users (id INTEGER)"))
//!         .with_backward(RunSql::new("DROP TABLE users")),
//! )?;
//! manager.up().await?;
//! # Ok(())
//! # }
//! ```

/// Errors, settings, settings loading, and logging setup.
pub use keel_core as core;

/// Values, rows, dialects, the connection traits, and the options store.
pub use keel_db as db;

/// Database backends: `SQLite` and `PostgreSQL`.
pub use keel_db_backends as db_backends;

/// Migration definitions, the ledger, and the migration manager.
pub use keel_migrations as migrations;

/// The `keel` command-line interface.
#[cfg(feature = "cli")]
pub use keel_cli as cli;

pub use keel_core::{KeelError, KeelResult, Settings};
pub use keel_migrations::{Migration, MigrationError, MigrationManager};

// Third-party re-exports
pub use async_trait::async_trait;
pub use chrono;
pub use tokio;
pub use tracing;
