//! SQL dialects understood by keel.
//!
//! A [`Dialect`] decides the parameter placeholder style and, one layer up,
//! which DDL/DML variants the migration ledger uses. Dialects are resolved
//! from a configuration tag such as `"sqlite"` or `"postgresql"`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The dialect tags accepted by [`Dialect::from_str`], in display order.
pub const SUPPORTED_TAGS: &[&str] = &["sqlite", "postgres", "postgresql"];

/// A SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `SQLite` 3.
    Sqlite,
    /// `PostgreSQL`.
    Postgres,
}

impl Dialect {
    /// Returns the canonical tag for this dialect.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Returns a parameter placeholder for the given 1-based index.
    ///
    /// ```
    /// use keel_db::Dialect;
    ///
    /// assert_eq!(Dialect::Postgres.placeholder(2), "$2");
    /// assert_eq!(Dialect::Sqlite.placeholder(2), "?");
    /// ```
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => "?".to_string(),
        }
    }

    /// Returns `count` comma-separated placeholders starting at index 1.
    pub fn placeholders(self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised when a dialect tag names no supported dialect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported database dialect: {tag} (supported: {})", SUPPORTED_TAGS.join(", "))]
pub struct UnsupportedDialect {
    /// The tag that was received.
    pub tag: String,
}

impl FromStr for Dialect {
    type Err = UnsupportedDialect;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(UnsupportedDialect {
                tag: tag.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
    }

    #[test]
    fn test_parse_unsupported() {
        let err = "mysql".parse::<Dialect>().unwrap_err();
        assert_eq!(err.tag, "mysql");
        assert_eq!(
            err.to_string(),
            "unsupported database dialect: mysql (supported: sqlite, postgres, postgresql)"
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholders(3), "$1, $2, $3");
        assert_eq!(Dialect::Sqlite.placeholders(3), "?, ?, ?");
        assert_eq!(Dialect::Sqlite.placeholders(0), "");
    }

    #[test]
    fn test_display_is_canonical_tag() {
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
        assert_eq!(
            Dialect::Postgres.to_string().parse::<Dialect>().unwrap(),
            Dialect::Postgres
        );
    }
}
