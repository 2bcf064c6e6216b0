//! Transaction executor
//!
//! Collects an ordered list of `(statement, positional parameters, optional
//! result key)` blocks and runs them against the store as one all-or-nothing
//! unit. Blocks run strictly in submission order; later statements may rely
//! on side effects of earlier ones.
//!
//! Any failure rolls the whole unit back and is returned to the caller. Lock
//! contention is retried only for the closing COMMIT. The future returned by
//! [`SqlTransaction::execute`] must be driven to completion: cancellation in
//! this crate is cooperative and never drops a running write.

use crate::db::retry::BusyBackoff;
use crate::{Error, Result};
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// One decoded result row, keyed by column name
pub type ResultRow = Map<String, Value>;

/// Result rows of every block that asked for them, keyed by result key
pub type TransactionResults = HashMap<String, Vec<ResultRow>>;

const DEFAULT_COMMIT_BUSY_MAX_WAIT: Duration = Duration::from_secs(5);

/// Scalar SQL parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    /// Bound as 0/1
    Bool(bool),
}

impl SqlParam {
    /// Convert a JSON value; arrays and objects are not bindable
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(SqlParam::Null),
            Value::Bool(b) => Ok(SqlParam::Bool(b)),
            Value::String(s) => Ok(SqlParam::Text(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlParam::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlParam::Real(f))
                } else {
                    Err(Error::InvalidInput(format!("Unsupported SQL number {}", n)))
                }
            }
            Value::Array(_) => Err(Error::InvalidInput(
                "Invalid SQL parameter kind: array".to_string(),
            )),
            Value::Object(_) => Err(Error::InvalidInput(
                "Invalid SQL parameter kind: object".to_string(),
            )),
        }
    }

    /// Text parameter, or NULL for an empty string
    pub fn text_or_null(text: &str) -> Self {
        if text.is_empty() {
            SqlParam::Null
        } else {
            SqlParam::Text(text.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Null)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&String> for SqlParam {
    fn from(value: &String) -> Self {
        SqlParam::Text(value.clone())
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<u32> for SqlParam {
    fn from(value: u32) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<usize> for SqlParam {
    fn from(value: usize) -> Self {
        SqlParam::Integer(value as i64)
    }
}

impl From<u64> for SqlParam {
    fn from(value: u64) -> Self {
        SqlParam::Integer(value.min(i64::MAX as u64) as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Real(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

#[derive(Debug, Clone)]
struct SqlBlock {
    sql: String,
    params: Vec<SqlParam>,
    out_key: Option<String>,
}

/// Ordered batch of statements executed as one unit
#[derive(Debug, Clone)]
pub struct SqlTransaction {
    use_sql_transaction: bool,
    commit_busy_max_wait: Duration,
    blocks: Vec<SqlBlock>,
}

impl Default for SqlTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlTransaction {
    /// Batch wrapped in BEGIN/COMMIT
    pub fn new() -> Self {
        Self {
            use_sql_transaction: true,
            commit_busy_max_wait: DEFAULT_COMMIT_BUSY_MAX_WAIT,
            blocks: Vec::new(),
        }
    }

    /// Batch executed statement by statement without BEGIN/COMMIT (reads)
    pub fn non_transactional() -> Self {
        Self {
            use_sql_transaction: false,
            ..Self::new()
        }
    }

    pub fn with_commit_busy_max_wait(mut self, max_wait: Duration) -> Self {
        self.commit_busy_max_wait = max_wait;
        self
    }

    /// Append a statement whose rows are discarded
    pub fn add_sql(&mut self, sql: impl Into<String>, params: Vec<SqlParam>) {
        self.blocks.push(SqlBlock {
            sql: sql.into(),
            params,
            out_key: None,
        });
    }

    /// Append a statement whose rows are returned under `out_key`
    pub fn add_query(&mut self, sql: impl Into<String>, params: Vec<SqlParam>, out_key: impl Into<String>) {
        self.blocks.push(SqlBlock {
            sql: sql.into(),
            params,
            out_key: Some(out_key.into()),
        });
    }

    /// Append a statement with JSON-valued parameters
    ///
    /// Fails immediately, adding nothing, if a parameter is not a scalar.
    pub fn add_sql_json(&mut self, sql: impl Into<String>, params: Vec<Value>) -> Result<()> {
        let params = params
            .into_iter()
            .map(SqlParam::from_json)
            .collect::<Result<Vec<_>>>()?;
        self.add_sql(sql, params);
        Ok(())
    }

    /// Insert a statement at `index`; used to inject faults between statements
    #[cfg(test)]
    pub(crate) fn insert_sql_at(&mut self, index: usize, sql: impl Into<String>, params: Vec<SqlParam>) {
        self.blocks.insert(
            index,
            SqlBlock {
                sql: sql.into(),
                params,
                out_key: None,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Run every block in order as one unit
    pub async fn execute(self, pool: &SqlitePool) -> Result<TransactionResults> {
        let mut conn = pool.acquire().await?;

        if !self.use_sql_transaction {
            return run_blocks(&mut conn, &self.blocks).await;
        }

        sqlx::query("BEGIN").execute(&mut *conn).await?;

        let outcome = match run_blocks(&mut conn, &self.blocks).await {
            Ok(results) => commit(&mut conn, self.commit_busy_max_wait)
                .await
                .map(|_| results),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(results) => {
                debug!(statements = self.blocks.len(), "Transaction committed");
                Ok(results)
            }
            Err(err) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!("Error while rolling back transaction: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

async fn commit(conn: &mut PoolConnection<Sqlite>, max_wait: Duration) -> Result<()> {
    let mut backoff = BusyBackoff::new("commit", max_wait);
    loop {
        match sqlx::query("COMMIT").execute(&mut **conn).await {
            Ok(_) => return Ok(()),
            Err(err) => backoff.wait_or_give_up(Error::Database(err)).await?,
        }
    }
}

async fn run_blocks(
    conn: &mut PoolConnection<Sqlite>,
    blocks: &[SqlBlock],
) -> Result<TransactionResults> {
    let mut results = TransactionResults::new();
    for block in blocks {
        let query = bind_params(sqlx::query(&block.sql), &block.params);
        match &block.out_key {
            Some(out_key) => {
                let rows = query.fetch_all(&mut **conn).await?;
                let decoded = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
                results.insert(out_key.clone(), decoded);
            }
            None => {
                query.execute(&mut **conn).await?;
            }
        }
    }
    Ok(results)
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(None::<String>),
            SqlParam::Text(text) => query.bind(text.as_str()),
            SqlParam::Integer(i) => query.bind(*i),
            SqlParam::Real(f) => query.bind(*f),
            SqlParam::Bool(b) => query.bind(i64::from(*b)),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<ResultRow> {
    let mut decoded = ResultRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" | "NUMERIC" => serde_json::Number::from_f64(row.try_get_unchecked::<f64, _>(index)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "TEXT" | "DATETIME" | "DATE" | "TIME" => {
                    Value::String(row.try_get_unchecked::<String, _>(index)?)
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                other => {
                    return Err(Error::Internal(format!(
                        "Invalid sql type {} for column \"{}\"",
                        other,
                        column.name()
                    )))
                }
            }
        };
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::{create_tables, init_database};
    use serde_json::json;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
    use std::time::Instant;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("tx.db"), Duration::from_millis(250))
            .await
            .unwrap();
        (dir, pool)
    }

    /// Two pools on one rollback-journal database, reporting busy immediately
    ///
    /// With a rollback journal a reader's shared lock blocks the writer's
    /// COMMIT, which WAL mode never does.
    async fn contended_pools() -> (TempDir, SqlitePool, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("contended.db"))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .busy_timeout(Duration::ZERO);
        let writer = SqlitePool::connect_with(options.clone()).await.unwrap();
        create_tables(&writer).await.unwrap();
        let other = SqlitePool::connect_with(options).await.unwrap();
        (dir, writer, other)
    }

    fn insert_state(key: &str) -> SqlTransaction {
        let mut tx = SqlTransaction::new().with_commit_busy_max_wait(Duration::from_secs(5));
        tx.add_sql(
            "INSERT INTO DBState (stateKey, stateValue) VALUES (?, 'v')",
            vec![key.into()],
        );
        tx
    }

    async fn state_rows(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM DBState")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    /// Open a read transaction on `pool` that holds a shared lock
    async fn hold_shared_lock(pool: &SqlitePool) -> PoolConnection<Sqlite> {
        let mut reader = pool.acquire().await.unwrap();
        sqlx::query("BEGIN").execute(&mut *reader).await.unwrap();
        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM DBState")
            .fetch_one(&mut *reader)
            .await
            .unwrap();
        reader
    }

    #[tokio::test]
    async fn test_busy_statement_fails_without_retry() {
        let (_dir, pool, other) = contended_pools().await;
        let mut holder = other.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *holder).await.unwrap();

        let started = Instant::now();
        let err = insert_state("k").execute(&pool).await.unwrap_err();
        assert!(err.is_busy(), "unexpected error: {}", err);
        // Well under the commit retry budget
        assert!(started.elapsed() < Duration::from_secs(1));

        sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
        drop(holder);
        assert_eq!(state_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_busy_commit_retried_until_lock_released() {
        let (_dir, pool, other) = contended_pools().await;
        let mut reader = hold_shared_lock(&other).await;

        let started = Instant::now();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sqlx::query("COMMIT").execute(&mut *reader).await.unwrap();
        });

        insert_state("k").execute(&pool).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        release.await.unwrap();
        assert_eq!(state_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_busy_commit_gives_up_and_rolls_back() {
        let (_dir, pool, other) = contended_pools().await;
        let mut reader = hold_shared_lock(&other).await;

        let tx = insert_state("k").with_commit_busy_max_wait(Duration::from_millis(50));
        let err = tx.execute(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)), "unexpected error: {}", err);

        sqlx::query("COMMIT").execute(&mut *reader).await.unwrap();
        drop(reader);
        assert_eq!(state_rows(&pool).await, 0);
    }

    #[test]
    fn test_json_params_reject_compound_values() {
        assert_eq!(SqlParam::from_json(json!(3)).unwrap(), SqlParam::Integer(3));
        assert_eq!(SqlParam::from_json(json!(1.5)).unwrap(), SqlParam::Real(1.5));
        assert_eq!(SqlParam::from_json(json!(true)).unwrap(), SqlParam::Bool(true));
        assert!(matches!(
            SqlParam::from_json(json!([1, 2])),
            Err(Error::InvalidInput(_))
        ));

        let mut tx = SqlTransaction::new();
        let result = tx.add_sql_json("SELECT ?", vec![json!({"a": 1})]);
        assert!(result.is_err());
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn test_results_keyed_by_out_key_and_column() {
        let (_dir, pool) = test_pool().await;

        let mut tx = SqlTransaction::new();
        tx.add_sql(
            "INSERT INTO DBState (stateKey, stateValue) VALUES (?, ?)",
            vec!["a".into(), "1".into()],
        );
        tx.add_query(
            "SELECT stateKey, stateValue, NULL AS missing, 7 AS seven, 2.5 AS half, ? AS flag FROM DBState",
            vec![true.into()],
            "rows",
        );
        let results = tx.execute(&pool).await.unwrap();

        let rows = &results["rows"];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["stateKey"], json!("a"));
        assert_eq!(rows[0]["missing"], Value::Null);
        assert_eq!(rows[0]["seven"], json!(7));
        assert_eq!(rows[0]["half"], json!(2.5));
        assert_eq!(rows[0]["flag"], json!(1));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_earlier_statements() {
        let (_dir, pool) = test_pool().await;

        let mut tx = SqlTransaction::new();
        tx.add_sql(
            "INSERT INTO DBState (stateKey, stateValue) VALUES (?, ?)",
            vec!["a".into(), "1".into()],
        );
        tx.add_sql("INSERT INTO NoSuchTable (x) VALUES (1)", vec![]);
        assert!(tx.execute(&pool).await.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM DBState")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        // Connection is usable again after the rollback
        let mut tx = SqlTransaction::new();
        tx.add_sql(
            "INSERT INTO DBState (stateKey, stateValue) VALUES (?, ?)",
            vec!["b".into(), SqlParam::Null],
        );
        tx.execute(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_statements_run_in_submission_order() {
        let (_dir, pool) = test_pool().await;

        let mut tx = SqlTransaction::new();
        tx.add_sql(
            "INSERT INTO DBState (stateKey, stateValue) VALUES ('k', 'first')",
            vec![],
        );
        tx.add_sql("UPDATE DBState SET stateValue = 'second' WHERE stateKey = 'k'", vec![]);
        tx.add_query("SELECT stateValue FROM DBState WHERE stateKey = 'k'", vec![], "value");
        let results = tx.execute(&pool).await.unwrap();
        assert_eq!(results["value"][0]["stateValue"], json!("second"));
    }
}
