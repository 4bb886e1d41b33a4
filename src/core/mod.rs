/// Core Module
///
/// Shared infrastructure of the handler: the error type, the response
/// envelope, and the database layer built on the driver traits.

pub mod db;
pub mod error;
pub mod response;

// Re-export commonly used types for convenience
pub use error::{HandlerError, Result};
pub use response::{QueryResult, ResultSet, StatusResponse, Value};
