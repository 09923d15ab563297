//! Error types for the migration engine.

use keel_core::KeelError;
use keel_db::dialect::{UnsupportedDialect, SUPPORTED_TAGS};
use thiserror::Error;

/// Everything that can go wrong while resolving a dialect or running
/// Up/Down/Status.
///
/// Every failure aborts the current operation; nothing is retried.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The dialect tag names no supported dialect.
    #[error("unsupported database dialect: {tag} (supported: {supported})")]
    UnsupportedDialect {
        /// The tag that was received.
        tag: String,
        /// The accepted tags, comma separated.
        supported: String,
    },

    /// A ledger read/write or transaction bookkeeping statement failed.
    #[error("{context}: {source}")]
    Storage {
        /// What the engine was doing.
        context: String,
        /// The underlying storage error.
        source: KeelError,
    },

    /// A migration's forward or backward action failed.
    #[error("migration {version} failed: {source}")]
    Migration {
        /// The migration being applied or reverted.
        version: String,
        /// The error raised by the action.
        source: KeelError,
    },

    /// The transaction wrapping a migration could not be committed.
    #[error("failed to commit migration {version}: {source}")]
    Commit {
        /// The migration whose transaction failed to commit.
        version: String,
        /// The underlying storage error.
        source: KeelError,
    },

    /// The ledger's most recent entry has no registered definition.
    #[error("migration {version} is recorded as applied but is not registered")]
    UnknownMigration {
        /// The version found in the ledger.
        version: String,
    },

    /// The migration to revert has no backward action.
    #[error("migration {version} cannot be rolled back: it has no backward action")]
    IrreversibleMigration {
        /// The irreversible migration.
        version: String,
    },

    /// Two definitions share one version.
    #[error("migration version {version} is registered twice")]
    DuplicateVersion {
        /// The repeated version.
        version: String,
    },

    /// Rolling back after a failure failed as well.
    #[error("{source} (rollback also failed: {rollback})")]
    Rollback {
        /// The failure that triggered the rollback.
        source: Box<MigrationError>,
        /// The error raised by the rollback itself.
        rollback: KeelError,
    },
}

impl MigrationError {
    /// Builds a closure wrapping a storage error with `context`, for use with
    /// `map_err`.
    pub fn storage(context: impl Into<String>) -> impl FnOnce(KeelError) -> Self {
        let context = context.into();
        move |source| Self::Storage { context, source }
    }

    /// Returns the migration version this error concerns, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Migration { version, .. }
            | Self::Commit { version, .. }
            | Self::UnknownMigration { version }
            | Self::IrreversibleMigration { version }
            | Self::DuplicateVersion { version } => Some(version),
            Self::Rollback { source, .. } => source.version(),
            Self::UnsupportedDialect { .. } | Self::Storage { .. } => None,
        }
    }
}

impl From<UnsupportedDialect> for MigrationError {
    fn from(e: UnsupportedDialect) -> Self {
        Self::UnsupportedDialect {
            tag: e.tag,
            supported: SUPPORTED_TAGS.join(", "),
        }
    }
}

/// A convenience type alias for `Result<T, MigrationError>`.
pub type MigrationResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_unsupported_dialect_from_parse_error() {
        let err: MigrationError = "oracle"
            .parse::<keel_db::Dialect>()
            .unwrap_err()
            .into();
        assert_eq!(
            err.to_string(),
            "unsupported database dialect: oracle (supported: sqlite, postgres, postgresql)"
        );
    }

    #[test]
    fn test_storage_helper_keeps_source() {
        let err = MigrationError::storage("failed to create migrations table")(
            KeelError::DatabaseError("disk full".into()),
        );
        assert_eq!(
            err.to_string(),
            "failed to create migrations table: Database error: disk full"
        );
        assert!(err.source().is_some());
        assert_eq!(err.version(), None);
    }

    #[test]
    fn test_rollback_chains_original_error() {
        let original = MigrationError::Migration {
            version: "20250101000002".into(),
            source: KeelError::DatabaseError("syntax error".into()),
        };
        let err = MigrationError::Rollback {
            source: Box::new(original),
            rollback: KeelError::OperationalError("connection reset".into()),
        };
        assert_eq!(err.version(), Some("20250101000002"));
        let text = err.to_string();
        assert!(text.contains("migration 20250101000002 failed"));
        assert!(text.contains("connection reset"));
        assert!(err.source().unwrap().to_string().contains("syntax error"));
    }

    #[test]
    fn test_version_accessor() {
        let err = MigrationError::IrreversibleMigration {
            version: "20250101000003".into(),
        };
        assert_eq!(err.version(), Some("20250101000003"));
    }
}
