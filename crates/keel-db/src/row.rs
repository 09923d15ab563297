//! Result rows returned by [`Executor::query`](crate::connection::Executor::query).

use chrono::{DateTime, NaiveDateTime, Utc};
use keel_core::KeelError;

use crate::value::Value;

/// A single row of query results with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, KeelError> {
        let value = self.get_value(column).ok_or_else(|| {
            KeelError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the value cannot be
    /// converted to the requested type.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> Result<T, KeelError> {
        let value = self.values.get(idx).ok_or_else(|| {
            KeelError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw Value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }
}

fn mismatch(expected: &str, value: &Value) -> KeelError {
    KeelError::DatabaseError(format!("expected {expected} column, got {}", value.kind()))
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, KeelError>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(mismatch("int", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        match value {
            Value::Bool(b) => Ok(*b),
            // SQLite has no boolean storage class.
            Value::Int(i) => Ok(*i != 0),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("text", value)),
        }
    }
}

/// Accepts native timestamps as well as the text forms `SQLite` stores:
/// RFC 3339 (written by keel) and `YYYY-MM-DD HH:MM:SS` (`CURRENT_TIMESTAMP`).
impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        match value {
            Value::DateTimeTz(dt) => Ok(*dt),
            Value::DateTime(naive) => Ok(naive.and_utc()),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .map(|naive| naive.and_utc())
                })
                .map_err(|e| {
                    KeelError::DatabaseError(format!("Invalid timestamp '{s}': {e}"))
                }),
            _ => Err(mismatch("timestamp", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, KeelError> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}
