//! Migration definitions and the operations they run.
//!
//! A [`Migration`] pairs a version and description with a forward
//! [`Operation`] and an optional backward one. The engine runs each operation
//! inside the transaction that also updates the ledger, so an operation's
//! changes and the ledger entry commit or roll back together.

use std::fmt;

use keel_core::KeelResult;
use keel_db::{Dialect, Transaction};

/// A unit of schema change run inside a migration transaction.
#[async_trait::async_trait]
pub trait Operation: Send + Sync {
    /// Returns a human-readable description of this operation.
    fn describe(&self) -> String;

    /// Runs the operation. The dialect is available as `tx.dialect()`.
    async fn run(&self, tx: &dyn Transaction) -> KeelResult<()>;
}

/// Runs raw SQL statements in order.
///
/// Each statement is executed separately, since neither backend accepts
/// several statements in one prepared call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSql {
    /// The statements to execute.
    pub statements: Vec<String>,
}

impl RunSql {
    /// A single statement.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            statements: vec![sql.into()],
        }
    }

    /// Several statements, executed in order.
    pub fn many<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Operation for RunSql {
    fn describe(&self) -> String {
        format!("Run SQL ({} statement(s))", self.statements.len())
    }

    async fn run(&self, tx: &dyn Transaction) -> KeelResult<()> {
        for sql in &self.statements {
            tx.execute(sql, &[]).await?;
        }
        Ok(())
    }
}

/// Runs different SQL depending on the dialect of the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectSql {
    /// What to run on SQLite.
    pub sqlite: RunSql,
    /// What to run on PostgreSQL.
    pub postgres: RunSql,
}

impl DialectSql {
    /// Creates a dialect-dependent operation.
    pub const fn new(sqlite: RunSql, postgres: RunSql) -> Self {
        Self { sqlite, postgres }
    }

    /// The statements chosen for `dialect`.
    pub const fn for_dialect(&self, dialect: Dialect) -> &RunSql {
        match dialect {
            Dialect::Sqlite => &self.sqlite,
            Dialect::Postgres => &self.postgres,
        }
    }
}

#[async_trait::async_trait]
impl Operation for DialectSql {
    fn describe(&self) -> String {
        "Run dialect-specific SQL".to_string()
    }

    async fn run(&self, tx: &dyn Transaction) -> KeelResult<()> {
        self.for_dialect(tx.dialect()).run(tx).await
    }
}

/// A versioned, optionally reversible schema change.
///
/// Versions are compared as plain strings; timestamp-style versions such as
/// `20250101000003` sort chronologically. A migration is immutable once built.
///
/// ```
/// use keel_migrations::{Migration, RunSql};
///
/// let m = Migration::new(
///     "20250101000001",
///     "create users",
///     RunSql::new("CREATE TABLE users (id INTEGER PRIMARY KEY)"),
/// )
/// .with_backward(RunSql::new("DROP TABLE users"));
/// assert!(m.is_reversible());
/// ```
pub struct Migration {
    version: String,
    description: String,
    forward: Box<dyn Operation>,
    backward: Option<Box<dyn Operation>>,
}

impl Migration {
    /// Creates an irreversible migration.
    pub fn new(
        version: impl Into<String>,
        description: impl Into<String>,
        forward: impl Operation + 'static,
    ) -> Self {
        Self {
            version: version.into(),
            description: description.into(),
            forward: Box::new(forward),
            backward: None,
        }
    }

    /// Adds the operation that undoes `forward`.
    #[must_use]
    pub fn with_backward(mut self, backward: impl Operation + 'static) -> Self {
        self.backward = Some(Box::new(backward));
        self
    }

    /// The unique version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The operation applied by Up.
    pub fn forward(&self) -> &dyn Operation {
        self.forward.as_ref()
    }

    /// The operation applied by Down, if any.
    pub fn backward(&self) -> Option<&dyn Operation> {
        self.backward.as_deref()
    }

    /// Whether Down can revert this migration.
    pub fn is_reversible(&self) -> bool {
        self.backward.is_some()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("forward", &self.forward.describe())
            .field("backward", &self.backward.as_ref().map(|op| op.describe()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_sql_many() {
        let op = RunSql::many(["CREATE TABLE a (id INTEGER)", "CREATE INDEX i ON a(id)"]);
        assert_eq!(op.statements.len(), 2);
        assert_eq!(op.describe(), "Run SQL (2 statement(s))");
    }

    #[test]
    fn test_dialect_sql_selects_branch() {
        let op = DialectSql::new(RunSql::new("lite"), RunSql::many(["pg1", "pg2"]));
        assert_eq!(op.for_dialect(Dialect::Sqlite).statements, ["lite"]);
        assert_eq!(op.for_dialect(Dialect::Postgres).statements, ["pg1", "pg2"]);
    }

    #[test]
    fn test_migration_accessors() {
        let m = Migration::new("20250101000002", "add index", RunSql::new("CREATE INDEX x"));
        assert_eq!(m.version(), "20250101000002");
        assert_eq!(m.description(), "add index");
        assert!(!m.is_reversible());
        assert!(m.backward().is_none());

        let m = m.with_backward(RunSql::new("DROP INDEX x"));
        assert!(m.is_reversible());
        assert_eq!(m.backward().unwrap().describe(), "Run SQL (1 statement(s))");
    }

    #[test]
    fn test_migration_debug_shows_operations() {
        let m = Migration::new("1", "one", RunSql::new("SELECT 1"));
        let dbg = format!("{m:?}");
        assert!(dbg.contains("version: \"1\""));
        assert!(dbg.contains("backward: None"));
    }
}
