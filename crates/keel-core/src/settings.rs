//! Settings for keel.
//!
//! [`Settings`] holds everything the migration tooling needs to know at
//! startup: logging behavior and the configured databases. It is plain data
//! passed explicitly to whatever needs it; there is no process-wide instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{KeelError, KeelResult};

/// The alias used when no database is named explicitly.
pub const DEFAULT_DATABASE: &str = "default";

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine tag (`sqlite` or `postgres`).
    pub engine: String,
    /// The database name (or file path for `SQLite`, `:memory:` for an in-memory database).
    pub name: String,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
    /// Upper bound on pooled connections (ignored by `SQLite`).
    pub max_connections: usize,
    /// Additional engine-specific options.
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: "keel.sqlite3".to_string(),
            user: String::new(),
            password: String::new(),
            host: String::new(),
            port: 0,
            max_connections: 16,
            options: HashMap::new(),
        }
    }
}

/// The complete set of keel settings.
///
/// # Examples
///
/// ```
/// use keel_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(!settings.debug);
/// assert_eq!(settings.log_level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    /// The log filter directive (e.g. "info", "debug", "keel_migrations=trace").
    pub log_level: String,

    /// Database configurations, keyed by alias (e.g. "default").
    pub databases: HashMap<String, DatabaseSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert(DEFAULT_DATABASE.to_string(), DatabaseSettings::default());

        Self {
            debug: false,
            log_level: "info".to_string(),
            databases,
        }
    }
}

impl Settings {
    /// Looks up the database configuration registered under `alias`.
    pub fn database(&self, alias: &str) -> KeelResult<&DatabaseSettings> {
        self.databases.get(alias).ok_or_else(|| {
            KeelError::ImproperlyConfigured(format!("No database configured with alias '{alias}'"))
        })
    }

    /// Returns the mutable `default` database configuration, creating it if absent.
    pub fn default_database_mut(&mut self) -> &mut DatabaseSettings {
        self.databases
            .entry(DEFAULT_DATABASE.to_string())
            .or_default()
    }
}
