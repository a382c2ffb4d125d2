//! Adapter error types.
//!
//! Startup errors abort construction: no adapter is handed back.
//! Request errors are reported through the error callback and returned to the
//! individual caller; they never affect other requests.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors raised while building or serving the adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to connect to {driver} database: {source}")]
    Connection {
        driver: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Timed out connecting to {driver} database after {timeout:?}")]
    ConnectTimeout { driver: String, timeout: Duration },

    #[error("Failed to load query file '{}': {source}", path.display())]
    QueryLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid binding annotation '{line}': {reason}")]
    BindingSyntax { line: String, reason: String },

    #[error("Failed to register handlers with document manager: {0}")]
    Registration(String),

    // ------------------------------------------------------------------
    // Request
    // ------------------------------------------------------------------
    #[error("Failed to build query: {0}")]
    QueryBuild(String),

    #[error("Failed to query DB: {0}")]
    QueryExecution(#[source] sqlx::Error),

    #[error("Failed to decode row: {0}")]
    RowDecode(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Adapter is closing")]
    Closed,
}

impl AdapterError {
    /// Whether this error belongs to a single request rather than startup.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            AdapterError::QueryBuild(_)
                | AdapterError::QueryExecution(_)
                | AdapterError::RowDecode(_)
                | AdapterError::Cancelled
                | AdapterError::DeadlineExceeded
                | AdapterError::Closed
        )
    }
}
