//! rusqlite-backed `DataConnection`.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Rewrite `{N}` placeholders into SQLite `?N+1` parameters.
//! - Convert between engine values and SQLite storage classes.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Every placeholder must reference a supplied parameter.

use super::connection::{DataConnection, DataRow, Parameter};
use super::dialect::Dialect;
use super::{DbError, DbResult};
use crate::model::restriction::PLACEHOLDER_RE;
use crate::model::value::Value;
use log::{debug, error, info};
use regex::Captures;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// SQLite connection implementing the engine's data access contract.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Raw connection for schema setup and direct SQL.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    fn prepare_statement(
        &self,
        sql: &str,
        parameters: &[Parameter],
    ) -> DbResult<(String, Vec<SqlValue>)> {
        let native_sql = rewrite_placeholders(sql, parameters.len())?;
        let values = parameters
            .iter()
            .map(|parameter| parameter.coerced_value().map(to_sql_value))
            .collect::<DbResult<Vec<_>>>()?;
        debug!(
            "event=sql_prepare module=db dialect=sqlite parameters={} sql={}",
            values.len(),
            native_sql
        );
        Ok((native_sql, values))
    }
}

impl DataConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute_scalar(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Value> {
        let (native_sql, values) = self.prepare_statement(sql, parameters)?;
        let mut stmt = self.conn.prepare(&native_sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;

        match rows.next()? {
            Some(row) => Ok(from_value_ref(row.get_ref(0)?)),
            None => Ok(Value::Null),
        }
    }

    fn execute_non_query(&self, sql: &str, parameters: &[Parameter]) -> DbResult<usize> {
        let (native_sql, values) = self.prepare_statement(sql, parameters)?;
        let changed = self.conn.execute(&native_sql, params_from_iter(values))?;
        Ok(changed)
    }

    fn retrieve_rows(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Vec<DataRow>> {
        let (native_sql, values) = self.prepare_statement(sql, parameters)?;
        let mut stmt = self.conn.prepare(&native_sql)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let column_count = columns.len();

        let mut rows = stmt.query(params_from_iter(values))?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let mut row_values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                row_values.push(from_value_ref(row.get_ref(index)?));
            }
            result.push(DataRow::new(Arc::clone(&columns), row_values));
        }

        Ok(result)
    }
}

/// Opens a SQLite database file.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<SqliteConnection> {
    open_with("file", || Connection::open(path))
}

/// Opens an in-memory SQLite database.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<SqliteConnection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<SqliteConnection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = open()
        .map_err(DbError::from)
        .and_then(|conn| bootstrap_connection(&conn).map(|()| conn));

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(SqliteConnection::new(conn))
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

fn rewrite_placeholders(sql: &str, supplied: usize) -> DbResult<String> {
    let mut missing = None;
    let rewritten = PLACEHOLDER_RE.replace_all(sql, |caps: &Captures<'_>| {
        let index: usize = caps[1].parse().unwrap_or(usize::MAX);
        if index >= supplied && missing.is_none() {
            missing = Some(index);
        }
        format!("?{}", index.saturating_add(1))
    });

    if let Some(index) = missing {
        return Err(DbError::MissingParameter { index, supplied });
    }

    Ok(rewritten.into_owned())
}

fn to_sql_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(flag)),
        Value::Integer(number) => SqlValue::Integer(number),
        Value::Real(number) => SqlValue::Real(number),
        Value::Text(text) => SqlValue::Text(text),
        Value::Blob(bytes) => SqlValue::Blob(bytes),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Integer(number),
        ValueRef::Real(number) => Value::Real(number),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::{open_db_in_memory, rewrite_placeholders};
    use crate::db::{DataConnection, DbError, Parameter};
    use crate::model::value::Value;

    #[test]
    fn placeholders_become_one_based_parameters() {
        let sql = rewrite_placeholders("a={0} AND b={1} OR c={10}", 11).unwrap();
        assert_eq!(sql, "a=?1 AND b=?2 OR c=?11");
    }

    #[test]
    fn placeholder_without_parameter_is_rejected() {
        let err = rewrite_placeholders("a={2}", 1).unwrap_err();
        assert!(matches!(err, DbError::MissingParameter { index: 2, supplied: 1 }));
    }

    #[test]
    fn scalar_and_rows_roundtrip_values() {
        let db = open_db_in_memory().unwrap();
        db.conn()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        let inserted = db
            .execute_non_query(
                "INSERT INTO t (id, name) VALUES ({0}, {1})",
                &[Parameter::new(Value::Integer(3)), Parameter::new(Value::from("x"))],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let count = db.execute_scalar("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(count, Value::Integer(1));

        let row = db
            .retrieve_row("SELECT * FROM t WHERE id={0}", &[Parameter::new(Value::Integer(3))])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("NAME"), Some(&Value::from("x")));
    }
}
