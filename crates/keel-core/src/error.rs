//! Core error types for keel.
//!
//! [`KeelError`] is the low-level error shared by every crate in the
//! workspace: storage failures raised by the database backends, and
//! configuration problems raised while loading settings. Higher layers (the
//! migration engine in particular) wrap it in their own, more specific types.

use thiserror::Error;

/// The primary error type for keel's storage and configuration layers.
#[derive(Error, Debug)]
pub enum KeelError {
    // ── Storage errors ───────────────────────────────────────────────

    /// Raised when a query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// Raised when a query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error (syntax errors, type mismatches, ...).
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A database integrity constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// An operational database error (connection failure, pool exhaustion, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The application is improperly configured (e.g. a backend that was not compiled in).
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KeelError {
    /// Returns `true` if this error was raised by the storage layer.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::DoesNotExist(_)
                | Self::MultipleObjectsReturned(_)
                | Self::DatabaseError(_)
                | Self::IntegrityError(_)
                | Self::OperationalError(_)
        )
    }

    /// Returns `true` for unique/foreign-key/check constraint violations.
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::IntegrityError(_))
    }
}

/// A convenience type alias for `Result<T, KeelError>`.
pub type KeelResult<T> = Result<T, KeelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keel_error_display() {
        let err = KeelError::DatabaseError("no such table: migrations".into());
        assert_eq!(err.to_string(), "Database error: no such table: migrations");

        let err = KeelError::ImproperlyConfigured("postgres backend disabled".into());
        assert_eq!(
            err.to_string(),
            "Improperly configured: postgres backend disabled"
        );
    }

    #[test]
    fn test_storage_classification() {
        assert!(KeelError::DatabaseError("x".into()).is_storage());
        assert!(KeelError::IntegrityError("x".into()).is_storage());
        assert!(KeelError::OperationalError("x".into()).is_storage());
        assert!(KeelError::DoesNotExist("x".into()).is_storage());
        assert!(!KeelError::ConfigurationError("x".into()).is_storage());
        assert!(!KeelError::SerializationError("x".into()).is_storage());
    }

    #[test]
    fn test_integrity_classification() {
        assert!(KeelError::IntegrityError("UNIQUE constraint failed".into()).is_integrity());
        assert!(!KeelError::DatabaseError("x".into()).is_integrity());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: KeelError = io_err.into();
        assert!(!err.is_storage());
        assert!(err.to_string().contains("file missing"));
    }
}
