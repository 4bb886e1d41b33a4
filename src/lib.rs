// Core infrastructure modules
pub mod core;

// Handler surface
pub mod config;
pub mod handler;
pub mod render;
pub mod testing;

pub use crate::config::{ConnectionParams, HandlerConfig};
pub use crate::core::{HandlerError, QueryResult, Result, ResultSet, StatusResponse, Value};
pub use crate::handler::{DatabaseHandler, PhoenixHandler};
