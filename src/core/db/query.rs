/// Query Execution Module
///
/// This module runs statement text against the handler's connection and
/// maps the driver's answer into a `QueryResult`. Failures never escape as
/// errors: they are logged together with the statement text and returned as
/// the `Error` variant.

use crate::core::db::connection::ConnectionManager;
use crate::core::db::driver::{ColumnDescriptor, Cursor, Driver, DriverConnection};
use crate::core::{QueryResult, Result, ResultSet};
use std::ops::{Deref, DerefMut};
use tracing::{debug, error};

/// A cursor that is closed exactly once when it goes out of scope.
pub struct ScopedCursor<K: Cursor> {
    cursor: K,
}

impl<K: Cursor> ScopedCursor<K> {
    pub fn new(cursor: K) -> Self {
        ScopedCursor { cursor }
    }
}

impl<K: Cursor> Deref for ScopedCursor<K> {
    type Target = K;

    fn deref(&self) -> &K {
        &self.cursor
    }
}

impl<K: Cursor> DerefMut for ScopedCursor<K> {
    fn deref_mut(&mut self) -> &mut K {
        &mut self.cursor
    }
}

impl<K: Cursor> Drop for ScopedCursor<K> {
    fn drop(&mut self) {
        if let Err(e) = self.cursor.close() {
            debug!("Ignoring error while closing cursor: {}", e);
        }
    }
}

/// Query execution service that operates on a handler's connection manager
pub struct QueryExecutor<'a, D: Driver> {
    manager: &'a mut ConnectionManager<D>,
}

impl<'a, D: Driver> QueryExecutor<'a, D> {
    pub fn new(manager: &'a mut ConnectionManager<D>) -> Self {
        QueryExecutor { manager }
    }

    /// Executes a statement and returns its result.
    ///
    /// Rows come back as `Table` with the driver's column order. A statement
    /// without rows is committed and acknowledged with `Ack`. Any failure,
    /// including failing to connect, becomes `Error` with the driver's
    /// message.
    pub fn execute(&mut self, sql: &str) -> QueryResult {
        let outcome = self
            .manager
            .with_connection(|connection| run_statement(connection, sql))
            .and_then(|result| result);

        match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Error running query: {} on the Phoenix Query Server! {}", sql, e);
                QueryResult::error(e.message())
            }
        }
    }

    /// Executes a statement only for its column metadata.
    ///
    /// The statement really runs and its rows are fetched, then discarded.
    ///
    /// # Errors
    ///
    /// Returns the connection or execution error reported by the driver.
    pub fn describe(&mut self, sql: &str) -> Result<Vec<ColumnDescriptor>> {
        self.manager
            .with_connection(|connection| -> Result<Vec<ColumnDescriptor>> {
                let mut cursor = ScopedCursor::new(connection.cursor()?);
                cursor.execute(sql)?;
                cursor.fetch_all()?;
                let columns = cursor.description().to_vec();
                Ok(columns)
            })
            .and_then(|result| result)
    }
}

fn run_statement<C: DriverConnection>(connection: &mut C, sql: &str) -> Result<QueryResult> {
    let mut cursor = ScopedCursor::new(connection.cursor()?);
    cursor.execute(sql)?;
    let rows = cursor.fetch_all()?;

    if rows.is_empty() {
        connection.commit()?;
        return Ok(QueryResult::Ack);
    }

    let columns = cursor
        .description()
        .iter()
        .map(|column| column.name.clone())
        .collect();
    Ok(QueryResult::Table(ResultSet::new(columns, rows)))
}
