/// Handler Error Module
///
/// This module defines the error types shared by every layer of the handler.
/// Driver bindings report failures through these variants so the connection
/// manager and query executor can classify them without knowing the driver.
use thiserror::Error;

/// Error type for the Phoenix handler.
///
/// Covers the failure scenarios of the handler:
/// - Establishing or authenticating a connection
/// - Executing, fetching or committing a statement
/// - Catalog and column introspection
/// - Rendering and parsing SQL
/// - Loading configuration
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The driver failed to establish or authenticate a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed during execute, fetch or commit
    #[error("Execution error: {0}")]
    Execution(String),

    /// A table or column listing could not be produced
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// The dialect renderer could not produce SQL for a statement
    #[error("Render error: {0}")]
    Render(String),

    /// SQL text could not be parsed into a statement
    #[error("Parse error: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the SQLite driver binding
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding and decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HandlerError {
    /// The bare driver message, without the category prefix.
    ///
    /// Responses carry this text so callers see exactly what the driver
    /// reported.
    pub fn message(&self) -> String {
        match self {
            HandlerError::Connection(msg)
            | HandlerError::Execution(msg)
            | HandlerError::Introspection(msg)
            | HandlerError::Render(msg)
            | HandlerError::Config(msg) => msg.clone(),
            HandlerError::Parse(e) => e.to_string(),
            HandlerError::Database(e) => e.to_string(),
            HandlerError::Io(e) => e.to_string(),
            HandlerError::Json(e) => e.to_string(),
            HandlerError::Toml(e) => e.to_string(),
        }
    }
}

/// Type alias for Result to use HandlerError as the error type.
pub type Result<T> = std::result::Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = HandlerError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let conn_err = HandlerError::Connection("refused".to_string());
        assert_eq!(conn_err.to_string(), "Connection error: refused");

        let config_err = HandlerError::Config("missing url".to_string());
        assert!(config_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_message_strips_category() {
        let err = HandlerError::Execution("Table undefined. tableName=FOO".to_string());
        assert_eq!(err.message(), "Table undefined. tableName=FOO");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HandlerError = io_err.into();
        match err {
            HandlerError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{ invalid json }");
        let err: HandlerError = json_err.unwrap_err().into();
        match err {
            HandlerError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
