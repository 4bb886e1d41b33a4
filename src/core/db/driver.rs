/// Driver Capability Module
///
/// The handler talks to the database exclusively through these traits.
/// A binding for a concrete client library implements them; the connection
/// manager, query executor and schema introspector never see anything else.
use crate::config::ConnectionParams;
use crate::core::{Result, Value};

/// Name and driver-reported type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        ColumnDescriptor {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Entry point of a database client library.
pub trait Driver {
    type Connection: DriverConnection;

    /// Opens a connection using every recognized parameter, including the
    /// ones that are `None`.
    fn open(&self, params: &ConnectionParams) -> Result<Self::Connection>;
}

/// A live connection owned by a single connection manager.
pub trait DriverConnection {
    type Cursor: Cursor;

    /// Creates a cursor for running one statement.
    fn cursor(&mut self) -> Result<Self::Cursor>;

    /// Commits the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Closes the connection. The handle is consumed whether or not closing
    /// succeeds.
    fn close(self) -> Result<()>;
}

/// A statement cursor.
pub trait Cursor {
    /// Executes a statement.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Fetches every remaining row of the last executed statement.
    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>>;

    /// Column metadata of the last executed statement, in result order.
    fn description(&self) -> &[ColumnDescriptor];

    /// Releases the cursor.
    fn close(&mut self) -> Result<()>;
}
