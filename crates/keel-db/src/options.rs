//! Key-value options stored in the `options` table.
//!
//! The table itself is created by the built-in `options` migration. The most
//! prominent key is `state`, which holds the application's persisted state
//! document.

use chrono::{DateTime, Utc};
use keel_core::{KeelError, KeelResult};

use crate::connection::Executor;
use crate::dialect::Dialect;
use crate::row::Row;
use crate::value::Value;

/// The key under which the application state document is stored.
pub const STATE_KEY: &str = "state";

/// A single row of the `options` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRecord {
    /// Surrogate key.
    pub id: i64,
    /// Unique option key.
    pub key: String,
    /// Option value; `None` when stored as NULL.
    pub value: Option<String>,
    /// When the option was first stored.
    pub created_at: DateTime<Utc>,
    /// When the option was last changed.
    pub updated_at: DateTime<Utc>,
}

impl OptionRecord {
    fn from_row(row: &Row) -> KeelResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            key: row.get("key")?,
            value: row.get("value")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// CRUD access to the `options` table through any [`Executor`].
///
/// ```rust,ignore
/// let store = OptionStore::new(&*conn);
/// store.upsert("state", "{\"ready\":true}").await?;
/// assert_eq!(store.state().await?.as_deref(), Some("{\"ready\":true}"));
/// ```
pub struct OptionStore<'a, E: Executor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> OptionStore<'a, E> {
    /// Creates a store issuing its statements through `executor`.
    pub const fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// Inserts a new option. Fails with [`KeelError::IntegrityError`] if the
    /// key already exists.
    pub async fn create(&self, key: &str, value: &str) -> KeelResult<()> {
        let now = Value::from(Utc::now());
        let sql = format!(
            "INSERT INTO options (key, value, created_at, updated_at) VALUES ({})",
            self.dialect().placeholders(4)
        );
        self.executor
            .execute(&sql, &[key.into(), value.into(), now.clone(), now])
            .await?;
        tracing::debug!(key, "option created");
        Ok(())
    }

    /// Fetches an option by key. Fails with [`KeelError::DoesNotExist`] when absent.
    pub async fn get(&self, key: &str) -> KeelResult<OptionRecord> {
        let sql = format!(
            "SELECT id, key, value, created_at, updated_at FROM options WHERE key = {}",
            self.dialect().placeholder(1)
        );
        self.executor
            .query_optional(&sql, &[key.into()])
            .await?
            .ok_or_else(|| KeelError::DoesNotExist(format!("option not found: {key}")))
            .and_then(|row| OptionRecord::from_row(&row))
    }

    /// Replaces the value of an existing option. Fails with
    /// [`KeelError::DoesNotExist`] when the key is absent.
    pub async fn update(&self, key: &str, value: &str) -> KeelResult<()> {
        let d = self.dialect();
        let sql = format!(
            "UPDATE options SET value = {}, updated_at = {} WHERE key = {}",
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3)
        );
        let affected = self
            .executor
            .execute(&sql, &[value.into(), Utc::now().into(), key.into()])
            .await?;
        if affected == 0 {
            return Err(KeelError::DoesNotExist(format!("option not found: {key}")));
        }
        tracing::debug!(key, "option updated");
        Ok(())
    }

    /// Updates the option if present, otherwise creates it.
    pub async fn upsert(&self, key: &str, value: &str) -> KeelResult<()> {
        match self.update(key, value).await {
            Err(KeelError::DoesNotExist(_)) => self.create(key, value).await,
            other => other,
        }
    }

    /// Deletes an option. Fails with [`KeelError::DoesNotExist`] when absent.
    pub async fn delete(&self, key: &str) -> KeelResult<()> {
        let sql = format!(
            "DELETE FROM options WHERE key = {}",
            self.dialect().placeholder(1)
        );
        let affected = self.executor.execute(&sql, &[key.into()]).await?;
        if affected == 0 {
            return Err(KeelError::DoesNotExist(format!("option not found: {key}")));
        }
        tracing::debug!(key, "option deleted");
        Ok(())
    }

    /// Lists every option ordered by key.
    pub async fn list(&self) -> KeelResult<Vec<OptionRecord>> {
        self.executor
            .query(
                "SELECT id, key, value, created_at, updated_at FROM options ORDER BY key",
                &[],
            )
            .await?
            .iter()
            .map(OptionRecord::from_row)
            .collect()
    }

    /// Returns the stored application state, or `None` if it was never saved.
    pub async fn state(&self) -> KeelResult<Option<String>> {
        match self.get(STATE_KEY).await {
            Ok(record) => Ok(record.value),
            Err(KeelError::DoesNotExist(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Saves the application state document.
    pub async fn set_state(&self, value: &str) -> KeelResult<()> {
        self.upsert(STATE_KEY, value).await
    }
}
