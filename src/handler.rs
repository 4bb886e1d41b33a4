//! The handler contract exposed to a query-federation host, and its Phoenix
//! implementation.
use crate::config::{ConnectionParams, HandlerConfig};
use crate::core::db::{ConnectionManager, Driver, QueryExecutor, SchemaIntrospector};
use crate::core::{QueryResult, StatusResponse};
use crate::render::{PhoenixRenderer, SqlRenderer};
use sqlparser::ast::Statement;
use tracing::error;

/// Type name of the Phoenix handler.
pub const NAME: &str = "phoenix";

/// Operations a host calls on a database handler.
pub trait DatabaseHandler {
    /// Opens the connection if it is not open yet.
    fn connect(&mut self) -> StatusResponse;

    /// Closes the connection and returns the resulting connected flag.
    fn disconnect(&mut self) -> bool;

    /// Checks that a connection can be made, without leaving a new one open.
    fn check_connection(&mut self) -> StatusResponse;

    /// Runs a statement given as text in the handler's dialect.
    fn native_query(&mut self, query: &str) -> QueryResult;

    /// Runs a parsed statement.
    fn query(&mut self, query: &Statement) -> QueryResult;

    /// Lists accessible tables as a `table_name` column.
    fn get_tables(&mut self) -> QueryResult;

    /// Lists the columns of a table as `column_name` and `data_type`.
    fn get_columns(&mut self, table_name: &str) -> QueryResult;
}

/// Handler for an Apache Phoenix query server.
///
/// Owns at most one connection, opened on first use. Dropping the handler
/// closes it.
pub struct PhoenixHandler<D: Driver, R: SqlRenderer = PhoenixRenderer> {
    name: String,
    manager: ConnectionManager<D>,
    renderer: R,
}

impl<D: Driver> PhoenixHandler<D> {
    /// Creates a handler instance called `name`.
    pub fn new(name: impl Into<String>, driver: D, params: ConnectionParams) -> Self {
        PhoenixHandler::with_renderer(name, driver, params, PhoenixRenderer)
    }

    /// Creates a handler from a loaded configuration file.
    pub fn from_config(driver: D, config: HandlerConfig) -> Self {
        PhoenixHandler::new(config.name, driver, config.connection)
    }
}

impl<D: Driver, R: SqlRenderer> PhoenixHandler<D, R> {
    pub fn with_renderer(
        name: impl Into<String>,
        driver: D,
        params: ConnectionParams,
        renderer: R,
    ) -> Self {
        PhoenixHandler {
            name: name.into(),
            manager: ConnectionManager::new(driver, params),
            renderer,
        }
    }

    /// Name of this handler instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dialect token statements are rendered for.
    pub fn dialect(&self) -> &str {
        self.renderer.dialect()
    }

    pub fn params(&self) -> &ConnectionParams {
        self.manager.params()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }
}

impl<D: Driver, R: SqlRenderer> DatabaseHandler for PhoenixHandler<D, R> {
    fn connect(&mut self) -> StatusResponse {
        match self.manager.connect() {
            Ok(_) => StatusResponse::ok(),
            Err(e) => {
                error!(handler = %self.name, "Error connecting to the Phoenix Query Server, {}!", e);
                StatusResponse::failed(e.message())
            }
        }
    }

    fn disconnect(&mut self) -> bool {
        self.manager.disconnect()
    }

    fn check_connection(&mut self) -> StatusResponse {
        self.manager.check_connection()
    }

    fn native_query(&mut self, query: &str) -> QueryResult {
        QueryExecutor::new(&mut self.manager).execute(query)
    }

    fn query(&mut self, query: &Statement) -> QueryResult {
        match self.renderer.render(query, true) {
            Ok(sql) => self.native_query(&sql),
            Err(e) => {
                error!(handler = %self.name, "Error rendering query for {}: {}", self.renderer.dialect(), e);
                QueryResult::error(e.message())
            }
        }
    }

    fn get_tables(&mut self) -> QueryResult {
        SchemaIntrospector::new(&mut self.manager).list_tables()
    }

    fn get_columns(&mut self, table_name: &str) -> QueryResult {
        SchemaIntrospector::new(&mut self.manager).list_columns(table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HandlerError, Result, ResultSet, Value};
    use crate::render::parse_statement;
    use crate::testing::FakeDriver;

    fn handler(driver: &FakeDriver) -> PhoenixHandler<FakeDriver> {
        PhoenixHandler::new("phoenix_datasource", driver.clone(), ConnectionParams::new("http://pqs:8765"))
    }

    struct RefusingRenderer;

    impl SqlRenderer for RefusingRenderer {
        fn dialect(&self) -> &str {
            "none"
        }

        fn render(&self, _ast: &Statement, _with_fallback: bool) -> Result<String> {
            Err(HandlerError::Render("nothing renders".to_string()))
        }
    }

    #[test]
    fn test_identity() {
        let driver = FakeDriver::new();
        let h = handler(&driver);
        assert_eq!(h.name(), "phoenix_datasource");
        assert_eq!(h.dialect(), "phoenix");
        assert_eq!(h.params().url, "http://pqs:8765");
    }

    #[test]
    fn test_connect_and_disconnect() {
        let driver = FakeDriver::new();
        let mut h = handler(&driver);

        assert!(h.connect().success);
        assert!(h.is_connected());
        assert!(!h.disconnect());
        assert!(!h.disconnect());
        assert_eq!(driver.closes(), 1);
    }

    #[test]
    fn test_connect_failure_status() {
        let driver = FakeDriver::new();
        driver.fail_open("Connection refused");
        let mut h = handler(&driver);

        let status = h.connect();
        assert!(!status.success);
        assert_eq!(status.error_message.as_deref(), Some("Connection refused"));
        assert!(!h.is_connected());
    }

    #[test]
    fn test_query_renders_and_forwards() {
        let driver = FakeDriver::new();
        let mut h = handler(&driver);

        let ast = parse_statement("INSERT INTO users (id, name) VALUES (3, 'c')").unwrap();
        assert_eq!(h.query(&ast), QueryResult::Ack);
        let executed = driver.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].starts_with("UPSERT INTO users"));
        assert!(executed[0].contains("VALUES (3, 'c')"));
        assert_eq!(driver.commits(), 1);
    }

    #[test]
    fn test_query_select_returns_rows() {
        let driver = FakeDriver::new();
        driver.respond("SELECT id FROM users", &[("id", "INTEGER")], vec![vec![1i64.into()]]);
        let mut h = handler(&driver);

        let ast = parse_statement("SELECT id FROM users").unwrap();
        assert_eq!(
            h.query(&ast),
            QueryResult::Table(ResultSet::new(vec!["id".to_string()], vec![vec![Value::Integer(1)]]))
        );
    }

    #[test]
    fn test_query_render_failure_is_error() {
        let driver = FakeDriver::new();
        let mut h = PhoenixHandler::with_renderer(
            "x",
            driver.clone(),
            ConnectionParams::new("http://pqs:8765"),
            RefusingRenderer,
        );

        let ast = parse_statement("SELECT 1").unwrap();
        assert_eq!(h.query(&ast), QueryResult::error("nothing renders"));
        assert_eq!(driver.opens(), 0);
    }

    #[test]
    fn test_drop_closes_connection() {
        let driver = FakeDriver::new();
        {
            let mut h = handler(&driver);
            h.connect();
        }
        assert_eq!(driver.closes(), 1);
    }
}
