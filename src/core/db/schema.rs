/// Schema Introspection Module
///
/// Lists the tables visible through the Phoenix catalog and the columns of a
/// single table. Both listings are produced by running ordinary queries
/// through the query executor, so they follow the same connection policy.

use crate::core::db::connection::ConnectionManager;
use crate::core::db::driver::Driver;
use crate::core::db::query::QueryExecutor;
use crate::core::{HandlerError, QueryResult, ResultSet, Value};
use tracing::{debug, error};

/// Catalog query listing every table together with its schema.
pub const TABLES_QUERY: &str = "SELECT DISTINCT TABLE_NAME, TABLE_SCHEM FROM SYSTEM.CATALOG";

/// Schema holding Phoenix's own metadata tables.
pub const SYSTEM_SCHEMA: &str = "SYSTEM";

const SCHEMA_COLUMN: &str = "TABLE_SCHEM";

/// Sample query used to discover a table's columns.
pub fn columns_query(table_name: &str) -> String {
    format!("SELECT * FROM {} LIMIT 5", table_name)
}

/// Table and column discovery over a handler's connection
pub struct SchemaIntrospector<'a, D: Driver> {
    manager: &'a mut ConnectionManager<D>,
}

impl<'a, D: Driver> SchemaIntrospector<'a, D> {
    pub fn new(manager: &'a mut ConnectionManager<D>) -> Self {
        SchemaIntrospector { manager }
    }

    /// Lists user tables as a single `table_name` column.
    ///
    /// Rows from the system schema are removed. If the catalog query fails,
    /// its error is returned unchanged.
    pub fn list_tables(&mut self) -> QueryResult {
        match QueryExecutor::new(self.manager).execute(TABLES_QUERY) {
            QueryResult::Table(mut rs) => {
                let Some(schem) = rs.column_index(SCHEMA_COLUMN) else {
                    let e = HandlerError::Introspection(format!(
                        "catalog result is missing the {} column",
                        SCHEMA_COLUMN
                    ));
                    error!("Error listing tables: {}", e);
                    return QueryResult::error(e.message());
                };
                rs.filter_rows(|row| row.get(schem).and_then(Value::as_str) != Some(SYSTEM_SCHEMA));
                rs.drop_column(schem);
                rs.rename_column(0, "table_name");
                debug!("Found {} tables", rs.len());
                QueryResult::Table(rs)
            }
            QueryResult::Ack => QueryResult::Table(ResultSet::new(vec!["table_name".to_string()], Vec::new())),
            err @ QueryResult::Error { .. } => err,
        }
    }

    /// Lists the columns of `table_name` as `column_name`/`data_type` pairs.
    ///
    /// The table name is placed into the sample query verbatim.
    pub fn list_columns(&mut self, table_name: &str) -> QueryResult {
        let query = columns_query(table_name);
        match QueryExecutor::new(self.manager).describe(&query) {
            Ok(columns) => {
                let rows = columns
                    .into_iter()
                    .map(|c| vec![Value::Text(c.name), Value::Text(c.type_name)])
                    .collect();
                QueryResult::Table(ResultSet::new(
                    vec!["column_name".to_string(), "data_type".to_string()],
                    rows,
                ))
            }
            Err(e) => {
                error!("Error running query: {} on the Phoenix Query Server! {}", query, e);
                QueryResult::error(e.message())
            }
        }
    }
}
