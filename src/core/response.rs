/// Response Envelope Module
///
/// Every handler operation answers with one of the types defined here:
/// `QueryResult` for statements and introspection, `StatusResponse` for
/// connection checks. Row data is only reachable through the `Table`
/// variant, so reading rows from an acknowledgement or an error cannot be
/// expressed.
use serde::Serialize;
use std::fmt;

/// A single cell value as reported by a driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the text content if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<BLOB {} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// An ordered, materialized result set.
///
/// Column order and row order are exactly as the driver returned them.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultSet { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Keeps only the rows matching `keep`, preserving their order.
    pub fn filter_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Removes the column at `index` from the header and from every row.
    pub fn drop_column(&mut self, index: usize) {
        if index >= self.columns.len() {
            return;
        }
        self.columns.remove(index);
        for row in &mut self.rows {
            if index < row.len() {
                row.remove(index);
            }
        }
    }

    /// Renames the column at `index`.
    pub fn rename_column(&mut self, index: usize, name: &str) {
        if let Some(column) = self.columns.get_mut(index) {
            *column = name.to_string();
        }
    }
}

/// Outcome of running a statement through the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    /// The statement returned rows
    Table(ResultSet),
    /// The statement succeeded without returning rows
    Ack,
    /// The statement failed; no rows are available
    Error { message: String },
}

impl QueryResult {
    /// Builds an `Error` result from any displayable message.
    pub fn error(message: impl Into<String>) -> Self {
        QueryResult::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error { .. })
    }

    /// The result set, if this is a `Table`.
    pub fn as_table(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Table(rs) => Some(rs),
            _ => None,
        }
    }

    /// The error message, if this is an `Error`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            QueryResult::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Result of a connection attempt or health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub error_message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        StatusResponse {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        StatusResponse {
            success: false,
            error_message: Some(message.into()),
        }
    }
}
