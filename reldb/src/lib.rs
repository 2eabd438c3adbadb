//! reldb - Release-dashboard database access layer
//!
//! The database layer for the release-management dashboard backend, built
//! on `mysql_async` with its own bounded connection pool.
//!
//! # Features
//!
//! - **Bounded Pool**: Semaphore-gated pool with acquire deadlines,
//!   exactly-once release, and age-based connection retirement
//! - **Declared Schemas**: Every read in the [`catalog`] names its result
//!   columns; rows come back in that order with explicit nulls
//! - **Swappable Backend**: The [`Database`] facade serves handlers from a
//!   live pool or an in-memory fixture, chosen once at startup
//! - **Typed Errors**: One [`Error`] taxonomy distinguishing pool timeouts,
//!   statement failures, and mapping failures
//!
//! # Example
//!
//! ```ignore
//! use reldb::{catalog, Database, DbConfig};
//!
//! async fn list_projects(db: &Database) -> reldb::Result<serde_json::Value> {
//!     let rows = db.query_many(&catalog::projects::list()).await?;
//!     Ok(rows.iter().map(|r| r.to_json()).collect())
//! }
//!
//! # async fn run() -> reldb::Result<()> {
//! let db = Database::connect(DbConfig::from_env()?).await?;
//! let healthy = db.health_check().await;
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod facade;
pub mod fixture;
pub mod mapper;
pub mod pool;
pub mod row;
pub mod statement;
pub mod value;

// Re-export main types
pub use backend::{Connection, MySqlConnection, MySqlManager};
pub use config::DbConfig;
pub use error::{Error, Result};
pub use executor::Executor;
pub use facade::{DataAccess, Database};
pub use fixture::FixtureBackend;
pub use mapper::RawRow;
pub use pool::{ConnectionManager, Pool, PoolOptions, PoolStatus, PooledConn};
pub use row::Row;
pub use statement::Statement;
pub use value::{FromValue, Value};
