/// SQLite Driver Binding
///
/// A local implementation of the driver traits on top of rusqlite. It lets
/// the handler run against a database file without a query server, which
/// the command line tool and the integration tests rely on.
///
/// Phoenix's catalog is emulated by an attached in-memory `SYSTEM` schema
/// whose `CATALOG` table is rebuilt from `sqlite_master` before every
/// statement. User tables have no schema (`NULL`), as in Phoenix.
///
/// With autocommit off, only statements that write open a transaction. It
/// stays open until the connection commits.

use crate::config::ConnectionParams;
use crate::core::db::driver::{ColumnDescriptor, Cursor, Driver, DriverConnection};
use crate::core::{HandlerError, Result, Value};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::rc::Rc;
use tracing::debug;

const CATALOG_SETUP_SQL: &str = r#"
ATTACH DATABASE ':memory:' AS SYSTEM;
CREATE TABLE SYSTEM.CATALOG (
    TABLE_NAME TEXT NOT NULL,
    TABLE_SCHEM TEXT
);
"#;

const CATALOG_REFRESH_SQL: &str = r#"
DELETE FROM SYSTEM.CATALOG;
INSERT INTO SYSTEM.CATALOG (TABLE_NAME, TABLE_SCHEM)
    SELECT name, NULL FROM main.sqlite_master
    WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%';
INSERT INTO SYSTEM.CATALOG (TABLE_NAME, TABLE_SCHEM) VALUES ('CATALOG', 'SYSTEM');
"#;

/// Where a SQLite connection URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    File(String),
}

impl SqliteTarget {
    /// Parses `sqlite::memory:`, `:memory:`, `sqlite://<path>` or a bare path.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == ":memory:" || url == "sqlite::memory:" {
            return Ok(SqliteTarget::Memory);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(HandlerError::Connection(format!(
                "the SQLite driver cannot reach a query server at {}",
                url
            )));
        }
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        if path.is_empty() {
            return Err(HandlerError::Connection("empty database path".to_string()));
        }
        Ok(SqliteTarget::File(path.to_string()))
    }
}

fn execution_error(e: rusqlite::Error) -> HandlerError {
    HandlerError::Execution(e.to_string())
}

/// Driver opening rusqlite connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn open(&self, params: &ConnectionParams) -> Result<SqliteConnection> {
        debug!(?params, "Opening SQLite connection");
        let conn = match SqliteTarget::parse(&params.url)? {
            SqliteTarget::Memory => Connection::open_in_memory(),
            SqliteTarget::File(path) => Connection::open(path),
        }
        .map_err(|e| HandlerError::Connection(e.to_string()))?;

        conn.execute_batch(CATALOG_SETUP_SQL)
            .map_err(|e| HandlerError::Connection(e.to_string()))?;

        Ok(SqliteConnection {
            conn: Rc::new(conn),
            autocommit: params.autocommit.unwrap_or(false),
        })
    }
}

/// A rusqlite connection shared with the cursors created from it.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Rc<Connection>,
    autocommit: bool,
}

impl DriverConnection for SqliteConnection {
    type Cursor = SqliteCursor;

    fn cursor(&mut self) -> Result<SqliteCursor> {
        Ok(SqliteCursor {
            conn: Some(Rc::clone(&self.conn)),
            autocommit: self.autocommit,
            description: Vec::new(),
            pending: Vec::new(),
        })
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT").map_err(execution_error)?;
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        match Rc::try_unwrap(self.conn) {
            Ok(conn) => conn
                .close()
                .map_err(|(_, e)| HandlerError::Connection(e.to_string())),
            // A cursor still holds the connection; it closes when that cursor goes.
            Err(_) => Ok(()),
        }
    }
}

/// Cursor over a `SqliteConnection`. Rows are fetched eagerly on execute.
#[derive(Debug)]
pub struct SqliteCursor {
    conn: Option<Rc<Connection>>,
    autocommit: bool,
    description: Vec<ColumnDescriptor>,
    pending: Vec<Vec<Value>>,
}

impl SqliteCursor {
    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| HandlerError::Execution("cursor is closed".to_string()))
    }
}

impl Cursor for SqliteCursor {
    fn execute(&mut self, sql: &str) -> Result<()> {
        let (description, fetched) = run_query(self.connection()?, self.autocommit, sql)?;
        self.description = description;
        self.pending = fetched;
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        self.connection()?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn description(&self) -> &[ColumnDescriptor] {
        &self.description
    }

    fn close(&mut self) -> Result<()> {
        self.conn = None;
        self.pending.clear();
        Ok(())
    }
}

fn run_query(
    conn: &Connection,
    autocommit: bool,
    sql: &str,
) -> Result<(Vec<ColumnDescriptor>, Vec<Vec<Value>>)> {
    conn.execute_batch(CATALOG_REFRESH_SQL).map_err(execution_error)?;

    let mut stmt = conn.prepare(sql).map_err(execution_error)?;
    // Only writes open a transaction; reads must not hold the file lock until commit.
    if !autocommit && !stmt.readonly() && conn.is_autocommit() {
        conn.execute_batch("BEGIN").map_err(execution_error)?;
    }
    let declared: Vec<(String, Option<String>)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
        .collect();
    let column_count = stmt.column_count();

    let mut rows = stmt.query([]).map_err(execution_error)?;
    let mut fetched = Vec::new();
    while let Some(row) = rows.next().map_err(execution_error)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(to_value(row.get_ref(i).map_err(execution_error)?));
        }
        fetched.push(values);
    }

    // Expression columns have no declared type; fall back to the first value's storage class.
    let description = declared
        .into_iter()
        .enumerate()
        .map(|(i, (name, decl_type))| {
            let type_name = decl_type.unwrap_or_else(|| {
                fetched
                    .first()
                    .and_then(|row: &Vec<Value>| row.get(i))
                    .map(storage_class)
                    .unwrap_or("")
                    .to_string()
            });
            ColumnDescriptor::new(name, type_name)
        })
        .collect();

    Ok((description, fetched))
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn storage_class(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) | Value::Integer(_) => "INTEGER",
        Value::Float(_) => "REAL",
        Value::Text(_) => "TEXT",
        Value::Blob(_) => "BLOB",
    }
}
