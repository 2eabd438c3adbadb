//! Database backends
//!
//! The executor talks to connections through the [`Connection`] trait; the
//! pool creates them through [`crate::pool::ConnectionManager`]. The live
//! implementation lives in [`mysql`]; tests supply in-memory fakes.

mod mysql;
mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::mapper::RawRow;
use crate::value::Value;

pub use mysql::{MySqlConnection, MySqlManager};

/// Query operations a physical connection must support.
///
/// `params` are already in positional order (statement expansion happens
/// before the backend is involved).
#[async_trait]
pub trait Connection: Send {
    /// Run a read statement and decode every returned record.
    async fn fetch_rows(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RawRow>>;

    /// Run a write statement inside an implicit transaction: commit on
    /// success, roll back and propagate on failure. Returns the affected
    /// row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Trivial liveness probe.
    async fn ping(&mut self) -> Result<()>;
}
