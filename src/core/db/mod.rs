/// Database Module
///
/// The database layer of the handler, organized into focused submodules:
/// - **Driver** (`driver.rs`): capability traits every driver binding implements
/// - **Connection Management** (`connection.rs`): the handler's single connection and its lifecycle
/// - **Query Execution** (`query.rs`): runs statements and builds `QueryResult`s
/// - **Schema Introspection** (`schema.rs`): table and column listings
/// - **SQLite** (`sqlite.rs`): a local driver binding on rusqlite
///
/// ## Error Handling
///
/// Connection failures surface as `HandlerError::Connection`. Query
/// execution never returns an error; failures become `QueryResult::Error`.
pub mod connection;
pub mod driver;
pub mod query;
pub mod schema;
pub mod sqlite;

pub use connection::*;
pub use driver::*;
pub use query::*;
pub use schema::*;
pub use sqlite::*;
