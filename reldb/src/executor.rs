//! Query executor
//!
//! Ties the pool, statement expansion, and the result mapper together. The
//! lease guard guarantees the handle is released exactly once on every exit
//! path, including mapping failures and caller cancellation; the executor
//! only adds the discard decision for connections that can no longer be
//! trusted.

use tracing::debug;

use crate::backend::Connection;
use crate::error::{Error, Result};
use crate::mapper;
use crate::pool::{ConnectionManager, Pool, PooledConn};
use crate::row::Row;
use crate::statement::Statement;

/// Executes statements against a pooled backend.
pub struct Executor<M>
where
    M: ConnectionManager,
    M::Conn: Connection,
{
    pool: Pool<M>,
}

impl<M> Executor<M>
where
    M: ConnectionManager,
    M::Conn: Connection,
{
    /// Wrap a pool in an executor.
    pub fn new(pool: Pool<M>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Run a read statement and map every record onto its declared schema.
    ///
    /// A query matching zero rows returns `Ok(vec![])`.
    pub async fn execute_read(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let (sql, params) = stmt.expand()?;
        let mut conn = self.pool.acquire().await?;
        let raw = match conn.fetch_rows(&sql, &params).await {
            Ok(raw) => raw,
            Err(e) => return Err(Self::fail(conn, e).await),
        };
        // The guard releases the handle when it drops, so a mapping failure
        // below still returns the connection.
        drop(conn);
        mapper::map_rows(stmt.columns(), raw)
    }

    /// Run a read statement and map the first record, if any.
    ///
    /// Zero rows is `Ok(None)`, never an error.
    pub async fn execute_read_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        let (sql, params) = stmt.expand()?;
        let mut conn = self.pool.acquire().await?;
        let raw = match conn.fetch_rows(&sql, &params).await {
            Ok(raw) => raw,
            Err(e) => return Err(Self::fail(conn, e).await),
        };
        drop(conn);
        match raw.into_iter().next() {
            Some(record) => Ok(Some(mapper::map_row(stmt.columns(), record)?)),
            None => Ok(None),
        }
    }

    /// Run a write statement inside an implicit transaction and return the
    /// affected count. The backend commits on success and rolls back on any
    /// failure before the error reaches us.
    pub async fn execute_write(&self, stmt: &Statement) -> Result<u64> {
        let (sql, params) = stmt.expand()?;
        let mut conn = self.pool.acquire().await?;
        match conn.execute(&sql, &params).await {
            Ok(affected) => {
                debug!(affected, "write statement committed");
                Ok(affected)
            }
            Err(e) => Err(Self::fail(conn, e).await),
        }
    }

    /// Liveness probe. Converts every failure, pool or connection, into
    /// `false`; repeated calls with no state change report the same result.
    pub async fn health_check(&self) -> bool {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(_) => return false,
        };
        match conn.ping().await {
            Ok(()) => true,
            Err(e) => {
                let _ = Self::fail(conn, e).await;
                false
            }
        }
    }

    /// Decide the leased handle's fate for a failed operation: discard it
    /// when the connection itself failed, return it otherwise. The error
    /// passes through untouched.
    async fn fail(conn: PooledConn<M>, error: Error) -> Error {
        if error.is_fatal_for_connection() {
            conn.discard().await;
        }
        error
    }
}
