//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `KEEL_DEBUG` | `debug` |
//! | `KEEL_LOG_LEVEL` | `log_level` |
//! | `KEEL_DATABASE_ENGINE` | `databases.default.engine` |
//! | `KEEL_DATABASE_NAME` | `databases.default.name` |
//! | `KEEL_DATABASE_HOST` | `databases.default.host` |
//! | `KEEL_DATABASE_PORT` | `databases.default.port` |
//! | `KEEL_DATABASE_USER` | `databases.default.user` |
//! | `KEEL_DATABASE_PASSWORD` | `databases.default.password` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use keel_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("keel.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::KeelError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Keys absent from the TOML keep their default values, including nested
/// database fields.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, KeelError> {
    // Deserialize into a generic value first so it can be deep-merged over the
    // serialized defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| KeelError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_into_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, KeelError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, KeelError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, KeelError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| KeelError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_into_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, KeelError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a file, choosing the format by extension (`.json` or
/// anything else as TOML), then applies environment variable overrides.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, KeelError> {
    let path = path.as_ref();
    let mut settings = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => from_json_file(path)?,
        _ => from_toml_file(path)?,
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `KEEL_*` environment variable overrides to a settings struct.
///
/// Database overrides always target the `default` alias. Unparseable numeric
/// values are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("KEEL_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("KEEL_LOG_LEVEL") {
        settings.log_level = val;
    }

    let db = settings.default_database_mut();

    if let Ok(val) = std::env::var("KEEL_DATABASE_ENGINE") {
        db.engine = val;
    }

    if let Ok(val) = std::env::var("KEEL_DATABASE_NAME") {
        db.name = val;
    }

    if let Ok(val) = std::env::var("KEEL_DATABASE_HOST") {
        db.host = val;
    }

    if let Ok(val) = std::env::var("KEEL_DATABASE_PORT") {
        if let Ok(port) = val.parse::<u16>() {
            db.port = port;
        }
    }

    if let Ok(val) = std::env::var("KEEL_DATABASE_USER") {
        db.user = val;
    }

    if let Ok(val) = std::env::var("KEEL_DATABASE_PASSWORD") {
        db.password = val;
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, KeelError> {
    std::fs::read_to_string(path).map_err(|e| {
        KeelError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_into_defaults(value: serde_json::Value, format: &str) -> Result<Settings, KeelError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        KeelError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let mut merged = merge_json(default_json, value);
    fill_database_defaults(&mut merged)?;
    serde_json::from_value(merged).map_err(|e| {
        KeelError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Gives every database alias the default field values, so that a config
/// declaring only `[databases.replica] engine = "postgres"` still deserializes.
fn fill_database_defaults(merged: &mut serde_json::Value) -> Result<(), KeelError> {
    let db_defaults = serde_json::to_value(crate::settings::DatabaseSettings::default())
        .map_err(|e| {
            KeelError::ConfigurationError(format!("Failed to serialize database defaults: {e}"))
        })?;

    if let Some(serde_json::Value::Object(databases)) = merged.get_mut("databases") {
        for entry in databases.values_mut() {
            let current = std::mem::take(entry);
            *entry = merge_json(db_defaults.clone(), current);
        }
    }
    Ok(())
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Environment variables are process-global; serialize the tests touching them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = true
            log_level = "debug"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.log_level, "debug");
        // Defaults preserved
        assert_eq!(settings.database("default").unwrap().engine, "sqlite");
    }

    #[test]
    fn test_from_toml_str_databases() {
        let toml = r#"
            [databases.default]
            engine = "postgres"
            name = "keel"
            user = "keel"
            password = "secret"
            host = "localhost"
            port = 5432
        "#;

        let settings = from_toml_str(toml).unwrap();
        let db = settings.database("default").unwrap();
        assert_eq!(db.engine, "postgres");
        assert_eq!(db.name, "keel");
        assert_eq!(db.user, "keel");
        assert_eq!(db.port, 5432);
        // Untouched nested field keeps its default
        assert_eq!(db.max_connections, 16);
    }

    #[test]
    fn test_from_toml_str_partial_extra_alias() {
        let toml = r#"
            [databases.reporting]
            engine = "postgres"
            name = "reports"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.databases.len(), 2);
        let db = settings.database("reporting").unwrap();
        assert_eq!(db.engine, "postgres");
        assert!(db.host.is_empty());
        assert_eq!(db.max_connections, 16);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(KeelError::ConfigurationError(_))));
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{
            "debug": true,
            "databases": { "default": { "engine": "sqlite", "name": ":memory:" } }
        }"#;

        let settings = from_json_str(json).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.database("default").unwrap().name, ":memory:");
    }

    #[test]
    fn test_from_json_str_invalid() {
        let result = from_json_str("{invalid json");
        assert!(result.is_err());
    }

    // ── File loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.toml");
        std::fs::write(&path, "log_level = \"warn\"\n").unwrap();

        let settings = from_toml_file(&path).unwrap();
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_from_file_with_env_picks_json_by_extension() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.json");
        std::fs::write(&path, r#"{"log_level": "trace"}"#).unwrap();

        let settings = from_file_with_env(&path).unwrap();
        assert_eq!(settings.log_level, "trace");
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/path/keel.toml");
        assert!(matches!(result, Err(KeelError::ConfigurationError(_))));
    }

    // ── Environment variable overrides ──────────────────────────────

    #[test]
    fn test_apply_env_overrides_database() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut settings = Settings::default();
        std::env::set_var("KEEL_DATABASE_ENGINE", "postgres");
        std::env::set_var("KEEL_DATABASE_HOST", "db.internal");
        std::env::set_var("KEEL_DATABASE_PORT", "5433");
        apply_env_overrides(&mut settings);
        std::env::remove_var("KEEL_DATABASE_ENGINE");
        std::env::remove_var("KEEL_DATABASE_HOST");
        std::env::remove_var("KEEL_DATABASE_PORT");

        let db = settings.database("default").unwrap();
        assert_eq!(db.engine, "postgres");
        assert_eq!(db.host, "db.internal");
        assert_eq!(db.port, 5433);
    }

    #[test]
    fn test_apply_env_overrides_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut settings = Settings::default();
        std::env::set_var("KEEL_DATABASE_PORT", "not-a-number");
        apply_env_overrides(&mut settings);
        std::env::remove_var("KEEL_DATABASE_PORT");

        assert_eq!(settings.database("default").unwrap().port, 0);
    }

    #[test]
    fn test_from_env_debug_and_level() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("KEEL_DEBUG", "yes");
        std::env::set_var("KEEL_LOG_LEVEL", "debug");
        let settings = from_env();
        std::env::remove_var("KEEL_DEBUG");
        std::env::remove_var("KEEL_LOG_LEVEL");

        assert!(settings.debug);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_toml_with_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keel.toml");
        std::fs::write(
            &path,
            "[databases.default]\nengine = \"sqlite\"\nname = \"from-file.db\"\n",
        )
        .unwrap();

        std::env::set_var("KEEL_DATABASE_NAME", "from-env.db");
        let settings = from_toml_file_with_env(&path).unwrap();
        std::env::remove_var("KEEL_DATABASE_NAME");

        assert_eq!(settings.database("default").unwrap().name, "from-env.db");
    }

    // ── merge_json helper ───────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"outer": {"a": 1, "b": 2}});
        let over = serde_json::json!({"outer": {"b": 3}});
        let merged = merge_json(base, over);
        assert_eq!(merged["outer"]["a"], 1);
        assert_eq!(merged["outer"]["b"], 3);
    }

    #[test]
    fn test_toml_to_json() {
        let toml_val: toml::Value = toml::from_str(
            r#"
            name = "test"
            count = 42
            [nested]
            key = "value"
        "#,
        )
        .unwrap();

        let json = toml_to_json(toml_val);
        assert_eq!(json["name"], "test");
        assert_eq!(json["count"], 42);
        assert_eq!(json["nested"]["key"], "value");
    }
}
