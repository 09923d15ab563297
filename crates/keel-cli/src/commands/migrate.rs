//! The `migrate` command.
//!
//! `keel migrate up` applies every pending migration, `keel migrate down`
//! reverts the most recently applied one, and `keel migrate status` lists
//! every registered migration with its state.

use std::fmt;
use std::io::Write;

use async_trait::async_trait;
use keel_core::settings::DEFAULT_DATABASE;
use keel_core::Settings;
use keel_db::Dialect;
use keel_migrations::{
    registry, Migration, MigrationError, MigrationManager, MigrationStatus, UpReport,
};

use crate::command::{CommandError, ManagementCommand};

/// One of the three `migrate` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    /// Apply all pending migrations.
    Up,
    /// Revert the most recently applied migration.
    Down,
    /// List every migration with its state.
    Status,
}

impl MigrateAction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// The result of a `migrate` action, rendered as the command's output.
#[derive(Debug)]
pub enum MigrateOutcome {
    /// `up` finished.
    Applied(UpReport),
    /// `down` finished; `None` when nothing was applied.
    Reverted(Option<String>),
    /// `status` rows in version order.
    Status(Vec<MigrationStatus>),
}

impl fmt::Display for MigrateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied(report) if report.applied.is_empty() => {
                writeln!(f, "No migrations to apply.")
            }
            Self::Applied(report) => {
                for version in &report.applied {
                    writeln!(f, "Applied {version}")?;
                }
                writeln!(f, "Applied {} migration(s).", report.count())
            }
            Self::Reverted(Some(version)) => writeln!(f, "Reverted {version}"),
            Self::Reverted(None) => writeln!(f, "No migrations to revert."),
            Self::Status(rows) if rows.is_empty() => writeln!(f, "No migrations registered."),
            Self::Status(rows) => {
                let width = rows.iter().map(|r| r.version.len()).max().unwrap_or(0);
                for row in rows {
                    writeln!(
                        f,
                        "{:<width$}  {:<7}  {}",
                        row.version,
                        row.state.to_string(),
                        row.description,
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Runs migrations against a configured database.
///
/// The migration set comes from a factory function so every invocation
/// gets fresh definitions; the default is [`registry::all`].
pub struct MigrateCommand {
    migrations: fn() -> Vec<Migration>,
}

impl Default for MigrateCommand {
    fn default() -> Self {
        Self::new(registry::all)
    }
}

impl MigrateCommand {
    /// Creates a command that runs the migrations returned by `migrations`.
    pub fn new(migrations: fn() -> Vec<Migration>) -> Self {
        Self { migrations }
    }

    /// Connects to the database registered under `alias` and loads the
    /// migration set into a manager.
    ///
    /// The dialect comes from the configured engine; unknown engines fail
    /// before any connection is attempted.
    pub async fn manager(
        &self,
        settings: &Settings,
        alias: &str,
    ) -> Result<MigrationManager, CommandError> {
        let db = settings.database(alias)?;
        let dialect: Dialect = db.engine.parse().map_err(MigrationError::from)?;
        let conn = keel_db_backends::connect(db).await?;

        let mut manager = MigrationManager::new(conn, dialect);
        manager.register_all((self.migrations)())?;
        Ok(manager)
    }

    /// Performs `action` with `manager`.
    pub async fn run(
        &self,
        action: MigrateAction,
        manager: &MigrationManager,
    ) -> Result<MigrateOutcome, CommandError> {
        let outcome = match action {
            MigrateAction::Up => MigrateOutcome::Applied(manager.up().await?),
            MigrateAction::Down => MigrateOutcome::Reverted(manager.down().await?),
            MigrateAction::Status => MigrateOutcome::Status(manager.status().await?),
        };
        Ok(outcome)
    }
}

#[async_trait]
impl ManagementCommand for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Apply, revert, or list schema migrations"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.subcommand_required(true)
            .arg(
                clap::Arg::new("database")
                    .long("database")
                    .global(true)
                    .default_value(DEFAULT_DATABASE)
                    .help("Database alias to migrate"),
            )
            .subcommand(clap::Command::new("up").about("Apply all pending migrations"))
            .subcommand(
                clap::Command::new("down").about("Revert the most recently applied migration"),
            )
            .subcommand(
                clap::Command::new("status").about("Show every migration and whether it is applied"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), CommandError> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| CommandError::Usage("migrate requires up, down, or status".into()))?;
        let action = MigrateAction::from_name(name)
            .ok_or_else(|| CommandError::Usage(format!("Unknown migrate action: {name}")))?;
        let alias = sub_matches
            .get_one::<String>("database")
            .map_or(DEFAULT_DATABASE, String::as_str);

        tracing::info!(database = alias, action = name, "running migrate");

        let manager = self.manager(settings, alias).await?;
        let outcome = self.run(action, &manager).await?;

        write!(std::io::stdout().lock(), "{outcome}")?;
        Ok(())
    }
}
