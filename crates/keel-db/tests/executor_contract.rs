//! Tests for the default methods of the [`Executor`] trait and for the SQL the
//! option store emits in each dialect, using an in-process fake executor.

use std::sync::Mutex;

use keel_core::{KeelError, KeelResult};
use keel_db::{Dialect, Executor, OptionStore, Row, Value};

/// Records every statement and answers queries with a canned result set.
struct FakeExecutor {
    dialect: Dialect,
    rows: Vec<Row>,
    affected: u64,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeExecutor {
    fn new(dialect: Dialect, rows: Vec<Row>, affected: u64) -> Self {
        Self {
            dialect,
            rows,
            affected,
            log: Mutex::new(Vec::new()),
        }
    }

    fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Executor for FakeExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<u64> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.affected)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.rows.clone())
    }
}

fn count_row(n: i64) -> Row {
    Row::new(vec!["count".into()], vec![Value::Int(n)])
}

// ── Executor defaults ─────────────────────────────────────────────────

#[tokio::test]
async fn test_query_one_empty_is_does_not_exist() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![], 0);
    let err = exec.query_one("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, KeelError::DoesNotExist(_)));
}

#[tokio::test]
async fn test_query_one_single_row() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![count_row(4)], 0);
    let row = exec.query_one("SELECT COUNT(*)", &[]).await.unwrap();
    assert_eq!(row.get::<i64>("count").unwrap(), 4);
}

#[tokio::test]
async fn test_query_one_many_rows() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![count_row(1), count_row(2)], 0);
    let err = exec.query_one("SELECT", &[]).await.unwrap_err();
    assert!(matches!(err, KeelError::MultipleObjectsReturned(_)));
}

#[tokio::test]
async fn test_query_optional_takes_first() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![count_row(1), count_row(2)], 0);
    let row = exec.query_optional("SELECT", &[]).await.unwrap().unwrap();
    assert_eq!(row.get::<i64>("count").unwrap(), 1);

    let empty = FakeExecutor::new(Dialect::Sqlite, vec![], 0);
    assert!(empty.query_optional("SELECT", &[]).await.unwrap().is_none());
}

// ── Option store SQL ──────────────────────────────────────────────────

#[tokio::test]
async fn test_option_store_uses_numbered_placeholders_on_postgres() {
    let exec = FakeExecutor::new(Dialect::Postgres, vec![], 1);
    OptionStore::new(&exec).update("theme", "dark").await.unwrap();

    let stmts = exec.statements();
    assert_eq!(stmts.len(), 1);
    assert_eq!(
        stmts[0].0,
        "UPDATE options SET value = $1, updated_at = $2 WHERE key = $3"
    );
    assert_eq!(stmts[0].1[0], Value::from("dark"));
    assert!(matches!(stmts[0].1[1], Value::DateTimeTz(_)));
    assert_eq!(stmts[0].1[2], Value::from("theme"));
}

#[tokio::test]
async fn test_option_store_uses_question_marks_on_sqlite() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![], 1);
    OptionStore::new(&exec).create("theme", "dark").await.unwrap();

    let stmts = exec.statements();
    assert_eq!(
        stmts[0].0,
        "INSERT INTO options (key, value, created_at, updated_at) VALUES (?, ?, ?, ?)"
    );
    assert!(matches!(stmts[0].1[2], Value::DateTimeTz(_)));
}

#[tokio::test]
async fn test_option_store_upsert_falls_back_to_insert() {
    // Zero rows affected makes the UPDATE report a missing key.
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![], 0);
    OptionStore::new(&exec).set_state("{}").await.unwrap();

    let stmts = exec.statements();
    assert_eq!(stmts.len(), 2);
    assert!(stmts[0].0.starts_with("UPDATE options"));
    assert!(stmts[1].0.starts_with("INSERT INTO options"));
    assert_eq!(stmts[1].1[0], Value::from("state"));
}

#[tokio::test]
async fn test_option_store_delete_missing_key() {
    let exec = FakeExecutor::new(Dialect::Postgres, vec![], 0);
    let err = OptionStore::new(&exec).delete("ghost").await.unwrap_err();
    assert!(matches!(err, KeelError::DoesNotExist(_)));
}

#[tokio::test]
async fn test_option_store_state_absent() {
    let exec = FakeExecutor::new(Dialect::Sqlite, vec![], 0);
    assert_eq!(OptionStore::new(&exec).state().await.unwrap(), None);
}
