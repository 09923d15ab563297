//! Connection configuration and the backend factory.
//!
//! [`DatabaseConfig`] is the validated form of a
//! [`DatabaseSettings`](keel_core::DatabaseSettings) entry, and [`connect`]
//! opens whichever backend the configuration names.

use std::collections::HashMap;
use std::sync::Arc;

use keel_core::{DatabaseSettings, KeelError, KeelResult};
use keel_db::{Connection, Dialect};

/// Configuration for connecting to a database.
///
/// This struct holds the connection parameters needed to establish a connection
/// to any supported database backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// The SQL dialect, which also selects the backend.
    pub dialect: Dialect,
    /// The database name or file path.
    pub name: String,
    /// The database host (for network-based backends).
    pub host: Option<String>,
    /// The database port.
    pub port: Option<u16>,
    /// The database user.
    pub user: Option<String>,
    /// The database password.
    pub password: Option<String>,
    /// Maximum number of pooled connections.
    pub max_connections: usize,
    /// Additional connection options.
    pub options: HashMap<String, String>,
}

impl DatabaseConfig {
    /// Creates a configuration for an in-memory SQLite database.
    pub fn sqlite_memory() -> Self {
        Self::sqlite_file(":memory:")
    }

    /// Creates a configuration for a SQLite file database.
    pub fn sqlite_file(path: impl Into<String>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            name: path.into(),
            host: None,
            port: None,
            user: None,
            password: None,
            max_connections: 1,
            options: HashMap::new(),
        }
    }

    /// Creates a configuration for a PostgreSQL database.
    pub fn postgres(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            dialect: Dialect::Postgres,
            name: name.into(),
            host: Some(host.into()),
            port: Some(port),
            user: Some(user.into()),
            password: Some(password.into()),
            max_connections: 16,
            options: HashMap::new(),
        }
    }

    /// Validates a settings entry.
    ///
    /// Fails with [`KeelError::ImproperlyConfigured`] when the engine tag names
    /// no supported dialect. Empty strings and a zero port count as unset.
    pub fn from_settings(settings: &DatabaseSettings) -> KeelResult<Self> {
        let dialect: Dialect = settings
            .engine
            .parse()
            .map_err(|e| KeelError::ImproperlyConfigured(format!("{e}")))?;

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Ok(Self {
            dialect,
            name: settings.name.clone(),
            host: non_empty(&settings.host),
            port: (settings.port != 0).then_some(settings.port),
            user: non_empty(&settings.user),
            password: non_empty(&settings.password),
            max_connections: settings.max_connections.max(1),
            options: settings.options.clone(),
        })
    }
}

/// Opens a connection to the database described by `settings` and checks
/// that it answers.
///
/// Fails with [`KeelError::ImproperlyConfigured`] for unknown engines or for
/// backends that were not compiled in, and with
/// [`KeelError::OperationalError`] when the database cannot be reached.
pub async fn connect(settings: &DatabaseSettings) -> KeelResult<Arc<dyn Connection>> {
    let config = DatabaseConfig::from_settings(settings)?;
    let conn = open(&config)?;
    conn.query("SELECT 1", &[])
        .await
        .map_err(|e| KeelError::OperationalError(format!("Database ping failed: {e}")))?;
    tracing::info!(
        vendor = conn.vendor(),
        database = %config.name,
        "database connection established"
    );
    Ok(conn)
}

fn open(config: &DatabaseConfig) -> KeelResult<Arc<dyn Connection>> {
    match config.dialect {
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Arc::new(crate::sqlite::SqliteBackend::open(&config.name)?)),
        #[cfg(feature = "postgres")]
        Dialect::Postgres => Ok(Arc::new(crate::postgresql::PostgresBackend::from_config(
            config,
        )?)),
        #[allow(unreachable_patterns)]
        other => Err(KeelError::ImproperlyConfigured(format!(
            "The {other} backend is not enabled in this build"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_sqlite_memory() {
        let cfg = DatabaseConfig::sqlite_memory();
        assert_eq!(cfg.dialect, Dialect::Sqlite);
        assert_eq!(cfg.name, ":memory:");
        assert!(cfg.host.is_none());
    }

    #[test]
    fn test_database_config_postgres() {
        let cfg = DatabaseConfig::postgres("keel", "localhost", 5432, "user", "pass");
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.host.as_deref(), Some("localhost"));
        assert_eq!(cfg.port, Some(5432));
        assert_eq!(cfg.user.as_deref(), Some("user"));
        assert_eq!(cfg.password.as_deref(), Some("pass"));
    }

    #[test]
    fn test_from_settings_treats_empty_as_unset() {
        let cfg = DatabaseConfig::from_settings(&DatabaseSettings::default()).unwrap();
        assert_eq!(cfg.dialect, Dialect::Sqlite);
        assert_eq!(cfg.name, "keel.sqlite3");
        assert!(cfg.host.is_none());
        assert!(cfg.port.is_none());
        assert!(cfg.user.is_none());
    }

    #[test]
    fn test_from_settings_postgresql_alias() {
        let settings = DatabaseSettings {
            engine: "postgresql".into(),
            host: "db".into(),
            port: 5432,
            max_connections: 0,
            ..DatabaseSettings::default()
        };
        let cfg = DatabaseConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.port, Some(5432));
        assert_eq!(cfg.max_connections, 1);
    }

    #[test]
    fn test_from_settings_unknown_engine() {
        let settings = DatabaseSettings {
            engine: "mysql".into(),
            ..DatabaseSettings::default()
        };
        let err = DatabaseConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, KeelError::ImproperlyConfigured(_)));
        assert!(err.to_string().contains("mysql"));
    }
}
