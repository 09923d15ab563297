//! Migrations shipped with keel.

use crate::migration::{DialectSql, Migration, RunSql};

/// Version of the migration creating the `options` table.
pub const CREATE_OPTIONS_TABLE: &str = "20250101000003";

/// Returns every built-in migration, in version order.
pub fn all() -> Vec<Migration> {
    vec![create_options_table()]
}

fn create_options_table() -> Migration {
    let sqlite = RunSql::new(
        "CREATE TABLE options (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key VARCHAR(255) NOT NULL UNIQUE,
            value TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    );
    let postgres = RunSql::many([
        "CREATE TABLE options (
            id SERIAL PRIMARY KEY,
            key VARCHAR(255) NOT NULL UNIQUE,
            value TEXT,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
        "CREATE INDEX idx_options_key ON options(key)",
    ]);

    Migration::new(
        CREATE_OPTIONS_TABLE,
        "Create options table",
        DialectSql::new(sqlite, postgres),
    )
    .with_backward(RunSql::new("DROP TABLE IF EXISTS options"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_migrations() {
        let all = all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version(), CREATE_OPTIONS_TABLE);
        assert_eq!(all[0].description(), "Create options table");
        assert!(all[0].is_reversible());
    }
}
