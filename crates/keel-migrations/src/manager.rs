//! The migration manager: registration plus the Up, Down and Status
//! algorithms.
//!
//! ## Transactions
//!
//! Every applied or reverted migration gets its own transaction. The
//! migration's operation and the matching ledger write run inside it, so
//! either both take effect or neither does. If a step fails the transaction
//! is rolled back and the whole run stops; a rollback that itself fails is
//! reported as [`MigrationError::Rollback`] with the original error attached.
//!
//! ## Concurrency
//!
//! The manager runs one statement at a time and never spawns tasks. Running
//! two managers against one database at the same time is not supported; the
//! ledger's unique constraint on `version` turns a lost race into a
//! [`MigrationError::Storage`] error rather than a double-applied migration.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use keel_core::logging::migration_span;
use keel_db::{Connection, Dialect, Transaction};
use tracing::Instrument;

use crate::dialect::detect_dialect;
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::migration::Migration;

/// The outcome of [`MigrationManager::up`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpReport {
    /// Versions applied by this run, in order.
    pub applied: Vec<String>,
}

impl UpReport {
    /// The number of migrations applied. Zero means nothing was pending.
    pub fn count(&self) -> usize {
        self.applied.len()
    }
}

/// Whether a registered migration has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// The ledger has an entry for the version.
    Applied,
    /// The migration has not been applied yet.
    Pending,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// One line of [`MigrationManager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// The migration version.
    pub version: String,
    /// The migration description.
    pub description: String,
    /// Applied or pending.
    pub state: MigrationState,
}

/// Applies, reverts and reports on a set of migrations against one database.
///
/// ```rust,ignore
/// let conn = keel_db_backends::connect(settings.database("default")?).await?;
/// let dialect = conn.dialect();
/// let mut manager = MigrationManager::new(conn, dialect);
/// manager.register_all(keel_migrations::registry::all())?;
/// let report = manager.up().await?;
/// println!("applied {} migration(s)", report.count());
/// ```
pub struct MigrationManager {
    conn: Arc<dyn Connection>,
    dialect: Dialect,
    /// Kept sorted by version.
    migrations: Vec<Migration>,
}

impl fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationManager")
            .field("dialect", &self.dialect)
            .field("migrations", &self.migrations)
            .finish_non_exhaustive()
    }
}

impl MigrationManager {
    /// Creates a manager that runs `dialect` SQL against `conn`.
    pub fn new(conn: Arc<dyn Connection>, dialect: Dialect) -> Self {
        Self {
            conn,
            dialect,
            migrations: Vec::new(),
        }
    }

    /// Creates a manager from a dialect tag such as `"postgresql"`.
    pub fn from_tag(conn: Arc<dyn Connection>, tag: &str) -> MigrationResult<Self> {
        Ok(Self::new(conn, tag.parse()?))
    }

    /// Creates a manager after probing `conn` for its dialect.
    ///
    /// Prefer [`new`](Self::new) when the dialect is known from
    /// configuration; probing issues throwaway queries.
    pub async fn detect(conn: Arc<dyn Connection>) -> MigrationResult<Self> {
        let dialect = detect_dialect(conn.as_ref()).await.into_dialect()?;
        tracing::debug!(%dialect, "detected database dialect");
        Ok(Self::new(conn, dialect))
    }

    /// The dialect the manager emits ledger SQL in.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The registered migrations, sorted by version.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Registers a migration. Fails if its version is already registered.
    pub fn register(&mut self, migration: Migration) -> MigrationResult<()> {
        match self
            .migrations
            .binary_search_by(|m| m.version().cmp(migration.version()))
        {
            Ok(_) => Err(MigrationError::DuplicateVersion {
                version: migration.version().to_string(),
            }),
            Err(pos) => {
                self.migrations.insert(pos, migration);
                Ok(())
            }
        }
    }

    /// Registers several migrations, stopping at the first duplicate.
    pub fn register_all(
        &mut self,
        migrations: impl IntoIterator<Item = Migration>,
    ) -> MigrationResult<()> {
        migrations.into_iter().try_for_each(|m| self.register(m))
    }

    fn ledger(&self) -> Ledger<'_, dyn Connection> {
        Ledger::new(self.conn.as_ref(), self.dialect)
    }

    /// Applies every pending migration in version order.
    ///
    /// Stops at the first failure; migrations before it stay applied and
    /// nothing after it is attempted.
    pub async fn up(&self) -> MigrationResult<UpReport> {
        let ledger = self.ledger();
        ledger.ensure_table().await?;

        let mut report = UpReport::default();
        for migration in &self.migrations {
            if ledger.is_applied(migration.version()).await? {
                tracing::debug!(
                    version = migration.version(),
                    "skipping already applied migration"
                );
                continue;
            }

            self.apply(migration)
                .instrument(migration_span(migration.version(), "up"))
                .await?;
            report.applied.push(migration.version().to_string());
        }

        if report.applied.is_empty() {
            tracing::info!("no pending migrations to apply");
        } else {
            tracing::info!(count = report.count(), "migrations applied");
        }
        Ok(report)
    }

    async fn apply(&self, migration: &Migration) -> MigrationResult<()> {
        let version = migration.version();
        tracing::info!(description = migration.description(), "applying migration");

        let tx = self.begin(version).await?;

        if let Err(source) = migration.forward().run(tx.as_ref()).await {
            let err = MigrationError::Migration {
                version: version.to_string(),
                source,
            };
            return Err(abort(tx, err).await);
        }

        let recorded = Ledger::new(tx.as_ref(), self.dialect)
            .record(version, migration.description(), Utc::now())
            .await;
        if let Err(err) = recorded {
            return Err(abort(tx, err).await);
        }

        tx.commit().await.map_err(|source| MigrationError::Commit {
            version: version.to_string(),
            source,
        })?;

        tracing::info!("migration applied");
        Ok(())
    }

    /// Reverts the most recently applied migration.
    ///
    /// Returns the reverted version, or `None` when nothing is applied.
    pub async fn down(&self) -> MigrationResult<Option<String>> {
        let ledger = self.ledger();
        ledger.ensure_table().await?;

        let Some(last) = ledger.most_recent().await? else {
            tracing::info!("no migrations to roll back");
            return Ok(None);
        };

        let migration = self
            .find(&last.version)
            .ok_or_else(|| MigrationError::UnknownMigration {
                version: last.version.clone(),
            })?;

        self.revert(migration)
            .instrument(migration_span(migration.version(), "down"))
            .await?;
        Ok(Some(last.version))
    }

    async fn revert(&self, migration: &Migration) -> MigrationResult<()> {
        let version = migration.version();
        let backward = migration
            .backward()
            .ok_or_else(|| MigrationError::IrreversibleMigration {
                version: version.to_string(),
            })?;

        tracing::info!(description = migration.description(), "rolling back migration");

        let tx = self.begin(version).await?;

        if let Err(source) = backward.run(tx.as_ref()).await {
            let err = MigrationError::Migration {
                version: version.to_string(),
                source,
            };
            return Err(abort(tx, err).await);
        }

        let removed = Ledger::new(tx.as_ref(), self.dialect)
            .remove(version)
            .await;
        if let Err(err) = removed {
            return Err(abort(tx, err).await);
        }

        tx.commit().await.map_err(|source| MigrationError::Commit {
            version: version.to_string(),
            source,
        })?;

        tracing::info!("migration rolled back");
        Ok(())
    }

    /// Reports every registered migration as applied or pending, in version
    /// order. Read-only apart from creating the ledger table if missing.
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatus>> {
        let ledger = self.ledger();
        ledger.ensure_table().await?;

        let mut statuses = Vec::with_capacity(self.migrations.len());
        for migration in &self.migrations {
            let state = if ledger.is_applied(migration.version()).await? {
                MigrationState::Applied
            } else {
                MigrationState::Pending
            };
            statuses.push(MigrationStatus {
                version: migration.version().to_string(),
                description: migration.description().to_string(),
                state,
            });
        }
        Ok(statuses)
    }

    /// Every ledger entry, oldest first, including versions that are no
    /// longer registered.
    pub async fn history(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let ledger = self.ledger();
        ledger.ensure_table().await?;
        ledger.entries().await
    }

    fn find(&self, version: &str) -> Option<&Migration> {
        self.migrations
            .binary_search_by(|m| m.version().cmp(version))
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    async fn begin(&self, version: &str) -> MigrationResult<Box<dyn Transaction>> {
        self.conn.begin().await.map_err(MigrationError::storage(format!(
            "failed to start transaction for migration {version}"
        )))
    }
}

/// Rolls `tx` back after `err`, chaining a failed rollback onto it.
async fn abort(tx: Box<dyn Transaction>, err: MigrationError) -> MigrationError {
    tracing::warn!(error = %err, "rolling back migration transaction");
    match tx.rollback().await {
        Ok(()) => err,
        Err(rollback) => {
            tracing::error!(error = %rollback, "rollback failed");
            MigrationError::Rollback {
                source: Box::new(err),
                rollback,
            }
        }
    }
}
