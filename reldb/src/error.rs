//! Error types for reldb

use std::time::Duration;
use thiserror::Error;

/// Result type alias for reldb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during database operations
#[derive(Error, Debug)]
pub enum Error {
    /// No connection became available before the acquire deadline.
    /// Recoverable: the caller may retry with backoff.
    #[error("pool timeout: no connection available within {0:?}")]
    PoolTimeout(Duration),

    /// Operation attempted after the pool was shut down
    #[error("pool is closed")]
    PoolClosed,

    /// The statement itself failed on the server (constraint violation,
    /// syntax error, ...). Surfaced after rollback and handle release.
    #[error("statement execution failed: {0}")]
    Statement(String),

    /// The physical connection failed (network drop, handshake failure)
    #[error("connection error: {0}")]
    Connection(String),

    /// A record could not be mapped onto the declared result schema
    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// Type conversion error
    #[error("type conversion error: expected {expected}, got {actual}")]
    TypeConversion {
        expected: &'static str,
        actual: String,
    },

    /// Column not found in a result row
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A named placeholder in the statement has no bound value
    #[error("unbound statement parameter: :{0}")]
    UnboundParameter(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<mysql_async::Error> for Error {
    fn from(err: mysql_async::Error) -> Self {
        match err {
            // Server-side failures leave the session usable; everything else
            // means the physical connection is suspect.
            mysql_async::Error::Server(e) => Error::Statement(e.to_string()),
            mysql_async::Error::Io(e) => Error::Connection(e.to_string()),
            mysql_async::Error::Driver(e) => Error::Connection(e.to_string()),
            mysql_async::Error::Url(e) => Error::Config(e.to_string()),
            other => Error::Connection(other.to_string()),
        }
    }
}

impl Error {
    /// Whether the physical connection should be discarded rather than
    /// returned to the pool after this error.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}
