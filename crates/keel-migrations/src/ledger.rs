//! The `migrations` table: which versions are applied, and when.
//!
//! A [`Ledger`] issues its statements through whatever [`Executor`] it is
//! given. The engine reads through the plain connection and writes through
//! the migration's transaction, so a ledger write commits or rolls back with
//! the schema change it records.

use chrono::{DateTime, Utc};
use keel_core::KeelResult;
use keel_db::{Dialect, Executor, Row, Value};

use crate::dialect::LedgerSql;
use crate::error::{MigrationError, MigrationResult};

/// One row of the `migrations` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Surrogate key assigned by the database.
    pub id: i64,
    /// The applied migration's version.
    pub version: String,
    /// The migration's description at the time it was applied.
    pub description: Option<String>,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn from_row(row: &Row) -> MigrationResult<Self> {
        Self::decode(row).map_err(MigrationError::storage("failed to read migrations table row"))
    }

    fn decode(row: &Row) -> KeelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            version: row.get("version")?,
            description: row.get("description")?,
            applied_at: row.get("applied_at")?,
        })
    }
}

/// Ledger operations scoped to one executor.
pub struct Ledger<'a, E: Executor + ?Sized> {
    executor: &'a E,
    sql: &'static LedgerSql,
}

impl<'a, E: Executor + ?Sized> Ledger<'a, E> {
    /// Creates a ledger that issues `dialect` SQL through `executor`.
    pub fn new(executor: &'a E, dialect: Dialect) -> Self {
        Self {
            executor,
            sql: LedgerSql::for_dialect(dialect),
        }
    }

    /// Creates the `migrations` table (and its index) if missing.
    pub async fn ensure_table(&self) -> MigrationResult<()> {
        self.executor
            .execute(self.sql.create_table, &[])
            .await
            .map_err(MigrationError::storage("failed to create migrations table"))?;
        if let Some(index) = self.sql.create_index {
            self.executor
                .execute(index, &[])
                .await
                .map_err(MigrationError::storage("failed to create migrations index"))?;
        }
        Ok(())
    }

    /// Whether `version` has an entry.
    pub async fn is_applied(&self, version: &str) -> MigrationResult<bool> {
        let count: i64 = self
            .executor
            .query_one(self.sql.count_version, &[version.into()])
            .await
            .and_then(|row| row.get_by_index(0))
            .map_err(MigrationError::storage(format!(
                "failed to check status of migration {version}"
            )))?;
        Ok(count > 0)
    }

    /// Inserts an entry for `version`.
    ///
    /// A second entry for the same version violates the table's unique
    /// constraint and surfaces as [`MigrationError::Storage`].
    pub async fn record(
        &self,
        version: &str,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> MigrationResult<()> {
        self.executor
            .execute(
                self.sql.insert,
                &[version.into(), description.into(), Value::from(applied_at)],
            )
            .await
            .map_err(MigrationError::storage(format!(
                "failed to record migration {version}"
            )))?;
        Ok(())
    }

    /// The latest entry, or `None` for an empty ledger.
    pub async fn most_recent(&self) -> MigrationResult<Option<LedgerEntry>> {
        let row = self
            .executor
            .query_optional(self.sql.most_recent, &[])
            .await
            .map_err(MigrationError::storage("failed to read last applied migration"))?;
        row.as_ref().map(LedgerEntry::from_row).transpose()
    }

    /// Deletes the entry for `version`.
    pub async fn remove(&self, version: &str) -> MigrationResult<()> {
        self.executor
            .execute(self.sql.delete, &[version.into()])
            .await
            .map_err(MigrationError::storage(format!(
                "failed to remove migration record {version}"
            )))?;
        Ok(())
    }

    /// Every entry, oldest first.
    pub async fn entries(&self) -> MigrationResult<Vec<LedgerEntry>> {
        self.executor
            .query(self.sql.list, &[])
            .await
            .map_err(MigrationError::storage("failed to list applied migrations"))?
            .iter()
            .map(LedgerEntry::from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use keel_db::Connection;
    use keel_db_backends::SqliteBackend;

    use super::*;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, secs).unwrap()
    }

    async fn ledger_db() -> SqliteBackend {
        let backend = SqliteBackend::memory().unwrap();
        Ledger::new(&backend, Dialect::Sqlite)
            .ensure_table()
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let backend = ledger_db().await;
        let ledger = Ledger::new(&backend, Dialect::Sqlite);
        ledger.ensure_table().await.unwrap();
        ledger.ensure_table().await.unwrap();
        assert!(ledger.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_is_applied() {
        let backend = ledger_db().await;
        let ledger = Ledger::new(&backend, Dialect::Sqlite);

        assert!(!ledger.is_applied("20250101000001").await.unwrap());
        ledger
            .record("20250101000001", "create users", at(1))
            .await
            .unwrap();
        assert!(ledger.is_applied("20250101000001").await.unwrap());

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "20250101000001");
        assert_eq!(entries[0].description.as_deref(), Some("create users"));
        assert_eq!(entries[0].applied_at, at(1));
    }

    #[tokio::test]
    async fn test_duplicate_record_is_storage_error() {
        let backend = ledger_db().await;
        let ledger = Ledger::new(&backend, Dialect::Sqlite);
        ledger.record("1", "one", at(1)).await.unwrap();

        let err = ledger.record("1", "one again", at(2)).await.unwrap_err();
        match err {
            MigrationError::Storage { source, .. } => assert!(source.is_integrity()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_most_recent_by_time_then_id() {
        let backend = ledger_db().await;
        let ledger = Ledger::new(&backend, Dialect::Sqlite);
        assert!(ledger.most_recent().await.unwrap().is_none());

        ledger.record("b", "later", at(5)).await.unwrap();
        ledger.record("a", "earlier", at(1)).await.unwrap();
        assert_eq!(ledger.most_recent().await.unwrap().unwrap().version, "b");

        // Same timestamp: the later insert wins.
        ledger.record("c", "tie", at(5)).await.unwrap();
        assert_eq!(ledger.most_recent().await.unwrap().unwrap().version, "c");

        let order: Vec<String> = ledger
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let backend = ledger_db().await;
        let ledger = Ledger::new(&backend, Dialect::Sqlite);
        ledger.record("1", "one", at(1)).await.unwrap();
        ledger.remove("1").await.unwrap();
        assert!(!ledger.is_applied("1").await.unwrap());
        assert!(ledger.most_recent().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_through_transaction_roll_back() {
        let backend = ledger_db().await;
        let tx = backend.begin().await.unwrap();
        Ledger::new(tx.as_ref(), Dialect::Sqlite)
            .record("1", "one", at(1))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(!Ledger::new(&backend, Dialect::Sqlite)
            .is_applied("1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_table_is_storage_error() {
        let backend = SqliteBackend::memory().unwrap();
        let err = Ledger::new(&backend, Dialect::Sqlite)
            .is_applied("1")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Storage { .. }));
        assert!(err.to_string().contains("failed to check status of migration 1"));
    }
}
