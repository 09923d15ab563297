//! Ledger SQL per dialect, and dialect detection by probing a connection.
//!
//! [`LedgerSql::for_dialect`] is the one place the engine decides which SQL
//! variant to emit for the `migrations` table. Callers normally name the
//! dialect explicitly; [`detect_dialect`] exists for handles whose dialect is
//! not known up front.

use keel_db::{Dialect, Executor};

use crate::error::MigrationResult;

/// Every statement the ledger issues, in one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSql {
    /// The dialect these statements target.
    pub dialect: Dialect,
    /// Idempotent `CREATE TABLE IF NOT EXISTS migrations`.
    pub create_table: &'static str,
    /// Additional idempotent index DDL run after `create_table`.
    pub create_index: Option<&'static str>,
    /// `COUNT(*)` of rows for one version, aliased `count`. One parameter.
    pub count_version: &'static str,
    /// Insert one entry. Parameters: version, description, applied_at.
    pub insert: &'static str,
    /// The latest entry by `applied_at`, ties broken by `id`.
    pub most_recent: &'static str,
    /// Delete by version. One parameter.
    pub delete: &'static str,
    /// Every entry, oldest first.
    pub list: &'static str,
}

static SQLITE: LedgerSql = LedgerSql {
    dialect: Dialect::Sqlite,
    create_table: "CREATE TABLE IF NOT EXISTS migrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        version VARCHAR(255) NOT NULL UNIQUE,
        description TEXT,
        applied_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    create_index: None,
    count_version: "SELECT COUNT(*) AS count FROM migrations WHERE version = ?",
    insert: "INSERT INTO migrations (version, description, applied_at) VALUES (?, ?, ?)",
    most_recent: "SELECT id, version, description, applied_at FROM migrations \
                  ORDER BY applied_at DESC, id DESC LIMIT 1",
    delete: "DELETE FROM migrations WHERE version = ?",
    list: "SELECT id, version, description, applied_at FROM migrations ORDER BY applied_at, id",
};

static POSTGRES: LedgerSql = LedgerSql {
    dialect: Dialect::Postgres,
    create_table: "CREATE TABLE IF NOT EXISTS migrations (
        id SERIAL PRIMARY KEY,
        version VARCHAR(255) NOT NULL UNIQUE,
        description TEXT,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    create_index: Some("CREATE INDEX IF NOT EXISTS idx_migrations_version ON migrations(version)"),
    count_version: "SELECT COUNT(*) AS count FROM migrations WHERE version = $1",
    insert: "INSERT INTO migrations (version, description, applied_at) VALUES ($1, $2, $3)",
    most_recent: "SELECT id, version, description, applied_at FROM migrations \
                  ORDER BY applied_at DESC, id DESC LIMIT 1",
    delete: "DELETE FROM migrations WHERE version = $1",
    list: "SELECT id, version, description, applied_at FROM migrations ORDER BY applied_at, id",
};

impl LedgerSql {
    /// Returns the ledger statements for `dialect`.
    pub fn for_dialect(dialect: Dialect) -> &'static Self {
        match dialect {
            Dialect::Sqlite => &SQLITE,
            Dialect::Postgres => &POSTGRES,
        }
    }

    /// Resolves a dialect tag (`sqlite`, `postgres`, `postgresql`, ...) and
    /// returns its ledger statements.
    pub fn for_tag(tag: &str) -> MigrationResult<&'static Self> {
        let dialect: Dialect = tag.parse()?;
        Ok(Self::for_dialect(dialect))
    }
}

/// The outcome of probing a connection for its dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedDialect {
    /// `SELECT sqlite_version()` succeeded.
    Sqlite,
    /// `SELECT version()` reported PostgreSQL.
    Postgres,
    /// Neither probe identified the database.
    Unknown,
}

impl DetectedDialect {
    /// Converts the probe result into a [`Dialect`], failing for `Unknown`.
    pub fn into_dialect(self) -> MigrationResult<Dialect> {
        match self {
            Self::Sqlite => Ok(Dialect::Sqlite),
            Self::Postgres => Ok(Dialect::Postgres),
            Self::Unknown => Err(keel_db::UnsupportedDialect {
                tag: "unknown".to_string(),
            }
            .into()),
        }
    }
}

/// Identifies the database behind `executor` by probing it.
///
/// Probe failures are not errors; they only rule a dialect out.
pub async fn detect_dialect<E: Executor + ?Sized>(executor: &E) -> DetectedDialect {
    if executor.query("SELECT sqlite_version()", &[]).await.is_ok() {
        return DetectedDialect::Sqlite;
    }

    let reports_postgres = match executor.query_optional("SELECT version()", &[]).await {
        Ok(Some(row)) => row
            .get_by_index::<String>(0)
            .map(|v| v.to_lowercase().contains("postgresql"))
            .unwrap_or(false),
        _ => false,
    };

    if reports_postgres {
        DetectedDialect::Postgres
    } else {
        tracing::debug!("dialect probes did not identify the database");
        DetectedDialect::Unknown
    }
}
