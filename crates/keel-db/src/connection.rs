//! Connection and transaction traits implemented by the database backends.
//!
//! The traits split along what a caller may do with a handle:
//!
//! - [`Executor`] runs statements and queries. Both a connection and an open
//!   transaction are executors, so code that only issues SQL (a migration's
//!   forward action, the ledger) takes `&dyn Executor` and works either way.
//! - [`Connection`] can additionally open a [`Transaction`].
//! - [`Transaction`] must be finished with [`commit`](Transaction::commit) or
//!   [`rollback`](Transaction::rollback); both consume it.
//!
//! All methods are async because database operations are I/O-bound. Backends
//! built on synchronous drivers (like `rusqlite`) run their work in
//! `spawn_blocking` to keep the async interface.

use keel_core::{KeelError, KeelResult};

use crate::dialect::Dialect;
use crate::row::Row;
use crate::value::Value;

/// Executes SQL against a database connection or an open transaction.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Returns the SQL dialect this executor speaks.
    fn dialect(&self) -> Dialect;

    /// Executes a SQL statement that does not return rows.
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64>;

    /// Executes a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>>;

    /// Executes a SQL query and returns exactly one row.
    ///
    /// Returns [`KeelError::DoesNotExist`] if no rows are returned, or
    /// [`KeelError::MultipleObjectsReturned`] if more than one row is returned.
    async fn query_one(&self, sql: &str, params: &[Value]) -> KeelResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(KeelError::DoesNotExist("No rows returned".to_string())),
            1 => rows
                .pop()
                .ok_or_else(|| KeelError::DoesNotExist("No rows returned".to_string())),
            n => Err(KeelError::MultipleObjectsReturned(format!(
                "Expected 1 row, got {n}"
            ))),
        }
    }

    /// Executes a SQL query and returns the first row, if any.
    async fn query_optional(&self, sql: &str, params: &[Value]) -> KeelResult<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }
}

/// A database connection (or pool) that can open transactions.
#[async_trait::async_trait]
pub trait Connection: Executor {
    /// Returns the vendor name (e.g., "postgresql", "sqlite").
    fn vendor(&self) -> &str;

    /// Begins a new database transaction.
    ///
    /// Statements issued through the returned handle run inside the
    /// transaction until it is committed or rolled back.
    async fn begin(&self) -> KeelResult<Box<dyn Transaction>>;
}

/// An open database transaction.
///
/// Dropping a transaction without committing abandons it: the backend rolls it
/// back on a best-effort basis or discards the underlying session.
#[async_trait::async_trait]
pub trait Transaction: Executor {
    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> KeelResult<()>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> KeelResult<()>;
}
