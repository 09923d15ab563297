//! Backend-neutral SQL values.
//!
//! [`Value`] carries statement parameters into a backend and column values
//! back out in a [`Row`](crate::row::Row). Its `Display` renders SQL literal
//! syntax, which is what statement tracing prints via [`Params`].

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// A backend-agnostic representation of a database value.
///
/// ```
/// use keel_db::value::Value;
///
/// assert_eq!(Value::from(42_i64), Value::Int(42));
/// assert_eq!(Value::from(None::<&str>), Value::Null);
/// assert_eq!(Value::from("it's").to_string(), "'it''s'");
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Timestamp without a zone, as `SQLite` `CURRENT_TIMESTAMP` produces.
    DateTime(NaiveDateTime),
    /// Timestamp in UTC; `TIMESTAMPTZ` on PostgreSQL.
    DateTimeTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::DateTime(_) => "timestamp",
            Self::DateTimeTz(_) => "timestamptz",
            Self::Json(_) => "json",
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "'{}'", text.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => quoted(f, s),
            Self::Bytes(bytes) => {
                f.write_str("X'")?;
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                f.write_str("'")
            }
            Self::DateTime(dt) => quoted(f, &dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Self::DateTimeTz(dt) => quoted(f, &dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Json(j) => quoted(f, &j.to_string()),
        }
    }
}

/// Displays a parameter list as `[v1, v2, ...]` in SQL literal syntax.
pub struct Params<'a>(pub &'a [Value]);

impl fmt::Display for Params<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident $(via $conv:path)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant($($conv)?(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int via i64::from,
    i64 => Int,
    f64 => Float,
    String => String,
    &str => String via String::from,
    Vec<u8> => Bytes,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeTz,
    serde_json::Value => Json,
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(7_i32), Value::Int(7));
        assert_eq!(Value::from("seed"), Value::String("seed".into()));
        assert_eq!(Value::from(Some(3_i64)), Value::Int(3));
        assert!(Value::from(None::<String>).is_null());

        let dt = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 3).unwrap();
        assert_eq!(Value::from(dt), Value::DateTimeTz(dt));
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bool(false).to_string(), "FALSE");
        assert_eq!(Value::from("O'Brien").to_string(), "'O''Brien'");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "X'DEAD'");
        assert_eq!(
            Value::from(serde_json::json!({"ready": true})).to_string(),
            r#"'{"ready":true}'"#
        );

        let dt = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(Value::DateTimeTz(dt).to_string(), "'2025-01-01T12:30:00Z'");
        assert_eq!(
            Value::DateTime(dt.naive_utc()).to_string(),
            "'2025-01-01 12:30:00'"
        );
    }

    #[test]
    fn test_params_display() {
        let params = [Value::from("20250101000001"), Value::Null, Value::Int(2)];
        assert_eq!(Params(&params).to_string(), "['20250101000001', NULL, 2]");
        assert_eq!(Params(&[]).to_string(), "[]");
    }

    #[test]
    fn test_kind() {
        assert_eq!(Value::from("x").kind(), "text");
        assert_eq!(Value::Int(1).kind(), "int");
        assert_eq!(Value::Null.kind(), "null");
    }
}
