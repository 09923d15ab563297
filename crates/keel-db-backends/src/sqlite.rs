//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements the
//! [`Connection`] trait using `rusqlite` wrapped in
//! `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode enabled by default for better concurrent read performance
//! - In-memory database support via `:memory:` path (great for testing)
//! - Simple `Mutex`-based concurrency control

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_core::{KeelError, KeelResult};
use keel_db::{Connection, Dialect, Executor, Params, Row, Transaction, Value};
use tokio::sync::Mutex;

type SharedConnection = Arc<Mutex<rusqlite::Connection>>;

/// A SQLite database backend.
///
/// Uses `rusqlite` for database access with a `Mutex`-based concurrency
/// model. All operations are run via `tokio::task::spawn_blocking` to
/// avoid blocking the async runtime.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: SharedConnection,
    /// Set when a transaction was dropped while the connection was busy.
    abandoned: Arc<AtomicBool>,
}

impl SqliteBackend {
    /// Opens a new SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    /// WAL journal mode is enabled by default for file-based databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> KeelResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| KeelError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| KeelError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            abandoned: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> KeelResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Binds `Value`s to a `rusqlite` statement.
fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> KeelResult<()> {
    for (i, param) in params.iter().enumerate() {
        let idx = i + 1;
        match param {
            Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
            Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
            Value::Int(v) => stmt.raw_bind_parameter(idx, v),
            Value::Float(v) => stmt.raw_bind_parameter(idx, v),
            Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
            Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
            Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_string().as_str()),
            // Fixed width keeps text ordering chronological.
            Value::DateTimeTz(dt) => stmt.raw_bind_parameter(
                idx,
                dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
                    .as_str(),
            ),
            Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
        }
        .map_err(|e| KeelError::DatabaseError(format!("Bind error: {e}")))?;
    }
    Ok(())
}

/// Converts a `rusqlite::Row` to our generic `Row`.
fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
    use rusqlite::types::ValueRef;

    let values: Vec<Value> = (0..column_names.len())
        .map(|i| match sqlite_row.get_ref(i).unwrap_or(ValueRef::Null) {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Int(v),
            ValueRef::Real(v) => Value::Float(v),
            ValueRef::Text(b) => Value::String(String::from_utf8_lossy(b).to_string()),
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        })
        .collect();

    Row::new(column_names.to_vec(), values)
}

/// Maps constraint violations to [`KeelError::IntegrityError`] and everything
/// else to [`KeelError::DatabaseError`].
fn map_sqlite_error(e: &rusqlite::Error) -> KeelError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => KeelError::IntegrityError(e.to_string()),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
            KeelError::OperationalError(e.to_string())
        }
        _ => KeelError::DatabaseError(e.to_string()),
    }
}

async fn execute_on(conn: &SharedConnection, sql: &str, params: &[Value]) -> KeelResult<u64> {
    tracing::trace!(sql, params = %Params(params), "sqlite execute");
    let conn = conn.clone();
    let sql = sql.to_string();
    let params = params.to_vec();

    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqlite_error(&e))?;
        bind_params(&mut stmt, &params)?;
        let count = stmt.raw_execute().map_err(|e| map_sqlite_error(&e))?;
        Ok(count as u64)
    })
    .await
    .map_err(|e| KeelError::DatabaseError(format!("Task join error: {e}")))?
}

async fn query_on(conn: &SharedConnection, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
    tracing::trace!(sql, params = %Params(params), "sqlite query");
    let conn = conn.clone();
    let sql = sql.to_string();
    let params = params.to_vec();

    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqlite_error(&e))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        bind_params(&mut stmt, &params)?;

        let mut raw_rows = stmt.raw_query();
        let mut rows = Vec::new();
        while let Some(row) = raw_rows.next().map_err(|e| map_sqlite_error(&e))? {
            rows.push(convert_row(row, &column_names));
        }

        Ok(rows)
    })
    .await
    .map_err(|e| KeelError::DatabaseError(format!("Task join error: {e}")))?
}

#[async_trait::async_trait]
impl Executor for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64> {
        execute_on(&self.conn, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        query_on(&self.conn, sql, params).await
    }
}

#[async_trait::async_trait]
impl Connection for SqliteBackend {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    async fn begin(&self) -> KeelResult<Box<dyn Transaction>> {
        if self.abandoned.swap(false, Ordering::SeqCst) {
            discard_open_transaction(&self.conn).await?;
        }
        execute_on(&self.conn, "BEGIN", &[]).await?;
        Ok(Box::new(SqliteTransaction {
            conn: self.conn.clone(),
            abandoned: self.abandoned.clone(),
            finished: false,
        }))
    }
}

/// Rolls back a transaction left open by a dropped [`SqliteTransaction`].
async fn discard_open_transaction(conn: &SharedConnection) -> KeelResult<()> {
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        if conn.is_autocommit() {
            return Ok(());
        }
        tracing::warn!("rolling back transaction abandoned while the connection was busy");
        conn.execute_batch("ROLLBACK")
            .map_err(|e| map_sqlite_error(&e))
    })
    .await
    .map_err(|e| KeelError::DatabaseError(format!("Task join error: {e}")))?
}

/// A transaction on a [`SqliteBackend`].
///
/// SQLite has one transaction per connection, so the handle shares the
/// backend's connection and brackets its statements with `BEGIN`/`COMMIT`.
///
/// Dropping an unfinished handle rolls back immediately when the connection
/// is free. If a statement still holds it, the rollback is deferred to the
/// backend's next [`begin`](Connection::begin).
pub struct SqliteTransaction {
    conn: SharedConnection,
    abandoned: Arc<AtomicBool>,
    finished: bool,
}

#[async_trait::async_trait]
impl Executor for SqliteTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64> {
        execute_on(&self.conn, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        query_on(&self.conn, sql, params).await
    }
}

#[async_trait::async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> KeelResult<()> {
        let mut this = self;
        // A failed COMMIT leaves the transaction open; Drop rolls it back.
        execute_on(&this.conn, "COMMIT", &[]).await?;
        this.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> KeelResult<()> {
        let mut this = self;
        this.finished = true;
        execute_on(&this.conn, "ROLLBACK", &[]).await.map(|_| ())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.try_lock() {
            Ok(conn) if !conn.is_autocommit() => {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %e, "rollback of abandoned transaction failed");
                }
            }
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("connection busy; deferring rollback of abandoned transaction");
                self.abandoned.store(true, Ordering::SeqCst);
            }
        }
    }
}
