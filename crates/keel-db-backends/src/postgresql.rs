//! PostgreSQL database backend using `tokio-postgres` and `deadpool-postgres`.
//!
//! This module provides the [`PostgresBackend`] which implements the
//! [`Connection`] trait using connection pooling via `deadpool-postgres`.
//! Each [`PostgresTransaction`] pins one pooled client for its lifetime.

use keel_core::{KeelError, KeelResult};
use keel_db::{Connection, Dialect, Executor, Params, Row, Transaction, Value};
use tokio_postgres::types::ToSql;

use crate::base::DatabaseConfig;

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// A PostgreSQL database backend.
///
/// Uses `deadpool-postgres` for connection pooling and `tokio-postgres` for
/// query execution.
pub struct PostgresBackend {
    pool: deadpool_postgres::Pool,
}

impl PostgresBackend {
    /// Creates a new `PostgresBackend` from a `deadpool-postgres` pool.
    pub const fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }

    /// Creates a new backend from a [`DatabaseConfig`].
    ///
    /// No connection is made until the first statement runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn from_config(config: &DatabaseConfig) -> KeelResult<Self> {
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.dbname = Some(config.name.clone());
        pg_config.host = config.host.clone();
        pg_config.port = config.port;
        pg_config.user = config.user.clone();
        pg_config.password = config.password.clone();
        pg_config.application_name = config.options.get("application_name").cloned();
        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections));

        let pool = pg_config
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .map_err(|e| KeelError::OperationalError(format!("Failed to create pool: {e}")))?;

        Ok(Self { pool })
    }

    async fn client(&self) -> KeelResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| KeelError::OperationalError(format!("Pool error: {e}")))
    }
}

/// Converts `Value`s to `tokio-postgres` parameters.
fn value_to_sql_params(params: &[Value]) -> Vec<SqlParam> {
    params
        .iter()
        .map(|v| -> SqlParam {
            match v {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(b) => Box::new(*b),
                Value::Int(i) => Box::new(*i),
                Value::Float(f) => Box::new(*f),
                Value::String(s) => Box::new(s.clone()),
                Value::Bytes(b) => Box::new(b.clone()),
                Value::DateTime(dt) => Box::new(*dt),
                Value::DateTimeTz(dt) => Box::new(*dt),
                Value::Json(j) => Box::new(j.clone()),
            }
        })
        .collect()
}

/// Converts a `tokio_postgres::Row` to our generic `Row`.
fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
    use tokio_postgres::types::Type;

    let columns: Vec<String> = pg_row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let values: Vec<Value> = pg_row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| match *col.type_() {
            Type::BOOL => pg_row
                .try_get::<_, Option<bool>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::Bool),
            Type::INT2 => pg_row
                .try_get::<_, Option<i16>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, |v| Value::Int(i64::from(v))),
            Type::INT4 => pg_row
                .try_get::<_, Option<i32>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, |v| Value::Int(i64::from(v))),
            Type::INT8 => pg_row
                .try_get::<_, Option<i64>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::Int),
            Type::FLOAT4 => pg_row
                .try_get::<_, Option<f32>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, |v| Value::Float(f64::from(v))),
            Type::FLOAT8 => pg_row
                .try_get::<_, Option<f64>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::Float),
            Type::BYTEA => pg_row
                .try_get::<_, Option<Vec<u8>>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::Bytes),
            Type::TIMESTAMP => pg_row
                .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::DateTime),
            Type::TIMESTAMPTZ => pg_row
                .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::DateTimeTz),
            Type::JSON | Type::JSONB => pg_row
                .try_get::<_, Option<serde_json::Value>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::Json),
            // TEXT, VARCHAR, NAME and anything unrecognised
            _ => pg_row
                .try_get::<_, Option<String>>(i)
                .ok()
                .flatten()
                .map_or(Value::Null, Value::String),
        })
        .collect();

    Row::new(columns, values)
}

/// Maps SQLSTATE class 23 (integrity constraint violation) to
/// [`KeelError::IntegrityError`], lost connections to
/// [`KeelError::OperationalError`], and everything else to
/// [`KeelError::DatabaseError`].
fn map_pg_error(e: &tokio_postgres::Error) -> KeelError {
    match e.code() {
        Some(state) if state.code().starts_with("23") => KeelError::IntegrityError(e.to_string()),
        None if e.is_closed() => KeelError::OperationalError(e.to_string()),
        _ => KeelError::DatabaseError(e.to_string()),
    }
}

async fn execute_on(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> KeelResult<u64> {
    tracing::trace!(sql, params = %Params(params), "postgres execute");
    let sql_params = value_to_sql_params(params);
    let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    client
        .execute(sql, &param_refs)
        .await
        .map_err(|e| map_pg_error(&e))
}

async fn query_on(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> KeelResult<Vec<Row>> {
    tracing::trace!(sql, params = %Params(params), "postgres query");
    let sql_params = value_to_sql_params(params);
    let param_refs: Vec<&(dyn ToSql + Sync)> = sql_params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let rows = client
        .query(sql, &param_refs)
        .await
        .map_err(|e| map_pg_error(&e))?;

    Ok(rows.iter().map(convert_row).collect())
}

#[async_trait::async_trait]
impl Executor for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64> {
        let client = self.client().await?;
        execute_on(&client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        let client = self.client().await?;
        query_on(&client, sql, params).await
    }
}

#[async_trait::async_trait]
impl Connection for PostgresBackend {
    fn vendor(&self) -> &str {
        "postgresql"
    }

    async fn begin(&self) -> KeelResult<Box<dyn Transaction>> {
        let client = self.client().await?;
        client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| map_pg_error(&e))?;
        Ok(Box::new(PostgresTransaction {
            client: Some(client),
        }))
    }
}

/// A transaction pinned to one pooled PostgreSQL client.
///
/// The client goes back to the pool only after a successful `COMMIT` or
/// `ROLLBACK`. A transaction that is dropped unfinished, or whose `COMMIT`
/// fails, detaches its client from the pool so the server-side session is
/// closed instead of being reused mid-transaction.
pub struct PostgresTransaction {
    client: Option<deadpool_postgres::Object>,
}

impl PostgresTransaction {
    fn client(&self) -> KeelResult<&tokio_postgres::Client> {
        self.client
            .as_ref()
            .map(|obj| &***obj)
            .ok_or_else(|| KeelError::OperationalError("Transaction already finished".into()))
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> KeelResult<()> {
        self.client()?
            .batch_execute(statement)
            .await
            .map_err(|e| map_pg_error(&e))?;
        // Back to the pool.
        self.client.take();
        Ok(())
    }
}

#[async_trait::async_trait]
impl Executor for PostgresTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64> {
        execute_on(self.client()?, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        query_on(self.client()?, sql, params).await
    }
}

#[async_trait::async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> KeelResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> KeelResult<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(obj) = self.client.take() {
            tracing::warn!("transaction dropped unfinished; discarding its connection");
            drop(deadpool_postgres::Object::take(obj));
        }
    }
}
