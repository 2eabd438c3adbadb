//! Data-access facade
//!
//! The only surface request handlers touch. The backend is chosen once at
//! construction time (live pool or in-memory fixture) and hidden behind the
//! [`DataAccess`] capability trait; handlers receive a [`Database`] handle
//! by injection and never see pools, executors, or drivers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::backend::{Connection, MySqlManager};
use crate::config::DbConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::fixture::FixtureBackend;
use crate::pool::{ConnectionManager, Pool};
use crate::row::Row;
use crate::statement::Statement;

/// The four operations the data-access layer exposes.
///
/// Implementations perform no business logic and no retries; retry policy
/// belongs to the caller.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Run a read statement, returning every mapped row (possibly none).
    async fn query_many(&self, stmt: &Statement) -> Result<Vec<Row>>;

    /// Run a read statement, returning the first mapped row if any.
    async fn query_one(&self, stmt: &Statement) -> Result<Option<Row>>;

    /// Run a write statement, returning the affected count.
    async fn mutate(&self, stmt: &Statement) -> Result<u64>;

    /// Liveness probe; never errors.
    async fn health_check(&self) -> bool;

    /// Tear the backend down. Idempotent.
    async fn close(&self);
}

struct LiveBackend<M>
where
    M: ConnectionManager,
    M::Conn: Connection,
{
    executor: Executor<M>,
}

#[async_trait]
impl<M> DataAccess for LiveBackend<M>
where
    M: ConnectionManager,
    M::Conn: Connection,
{
    async fn query_many(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.executor.execute_read(stmt).await
    }

    async fn query_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        self.executor.execute_read_one(stmt).await
    }

    async fn mutate(&self, stmt: &Statement) -> Result<u64> {
        self.executor.execute_write(stmt).await
    }

    async fn health_check(&self) -> bool {
        self.executor.health_check().await
    }

    async fn close(&self) {
        self.executor.pool().close().await;
    }
}

/// Handle to the data-access layer. Cheap to clone; all clones share one
/// backend.
///
/// # Example
///
/// ```ignore
/// use reldb::{catalog, Database, DbConfig};
///
/// let db = Database::connect(DbConfig::from_env()?).await?;
/// let projects = db.query_many(&catalog::projects::list()).await?;
/// db.close().await;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<dyn DataAccess>,
}

impl Database {
    /// Construct the backend the configuration asks for: the seeded fixture
    /// in mock mode, otherwise a live MySQL pool (established eagerly, so a
    /// bad DSN fails here rather than on first query).
    pub async fn connect(config: DbConfig) -> Result<Self> {
        if config.mock_mode {
            info!("mock mode enabled, using fixture backend");
            return Ok(Self::fixture(FixtureBackend::seeded()));
        }
        let manager = MySqlManager::from_config(&config)?;
        let pool = Pool::open(config.pool_options(), manager).await?;
        Ok(Self::live(Executor::new(pool)))
    }

    /// Wrap an executor over any connection manager.
    pub fn live<M>(executor: Executor<M>) -> Self
    where
        M: ConnectionManager,
        M::Conn: Connection,
    {
        Self {
            inner: Arc::new(LiveBackend { executor }),
        }
    }

    /// Wrap a fixture backend.
    pub fn fixture(backend: FixtureBackend) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// See [`DataAccess::query_many`].
    pub async fn query_many(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.inner.query_many(stmt).await
    }

    /// See [`DataAccess::query_one`].
    pub async fn query_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        self.inner.query_one(stmt).await
    }

    /// See [`DataAccess::mutate`].
    pub async fn mutate(&self, stmt: &Statement) -> Result<u64> {
        self.inner.mutate(stmt).await
    }

    /// See [`DataAccess::health_check`].
    pub async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    /// Tear the backend down.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}
