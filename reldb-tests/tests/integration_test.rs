//! Integration tests for reldb over an in-memory backend
//!
//! These tests drive the full stack (pool, executor, mapper, facade)
//! through the `ConnectionManager` and `Connection` seams with a scripted
//! fake, so pool accounting and error routing are verified without a
//! database server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reldb::backend::Connection;
use reldb::{
    catalog, ConnectionManager, Database, DbConfig, Error, Executor, Pool, PoolOptions, RawRow,
    Result, Statement, Value,
};

/// Scripted server state shared by every fake connection.
#[derive(Default)]
struct FakeServer {
    reads: Mutex<HashMap<String, Vec<RawRow>>>,
    failing_writes: Mutex<Vec<String>>,
    unreachable: AtomicBool,
    connect_delay_ms: AtomicU64,
    connects: AtomicU64,
    closes: AtomicU64,
}

impl FakeServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script_read(&self, sql: &str, rows: Vec<RawRow>) {
        self.reads
            .lock()
            .unwrap()
            .insert(sql.to_string(), rows);
    }

    fn fail_write(&self, sql: &str) {
        self.failing_writes.lock().unwrap().push(sql.to_string());
    }

    fn set_unreachable(&self, down: bool) {
        self.unreachable.store(down, Ordering::SeqCst);
    }

    fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

struct FakeManager {
    server: Arc<FakeServer>,
}

#[async_trait]
impl ConnectionManager for FakeManager {
    type Conn = FakeConn;

    async fn connect(&self) -> Result<FakeConn> {
        let delay = self.server.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.server.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("fake server unreachable".into()));
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConn {
            server: Arc::clone(&self.server),
        })
    }

    async fn close(&self, _conn: FakeConn) {
        self.server.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeConn {
    server: Arc<FakeServer>,
}

#[async_trait]
impl Connection for FakeConn {
    async fn fetch_rows(&mut self, sql: &str, _params: &[Value]) -> Result<Vec<RawRow>> {
        if self.server.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection reset".into()));
        }
        Ok(self
            .server
            .reads
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<u64> {
        if self.server.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection reset".into()));
        }
        if self
            .server
            .failing_writes
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == sql)
        {
            return Err(Error::Statement("constraint violation".into()));
        }
        Ok(1)
    }

    async fn ping(&mut self) -> Result<()> {
        if self.server.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection reset".into()));
        }
        Ok(())
    }
}

fn quick_options() -> PoolOptions {
    PoolOptions::default()
        .min_size(0)
        .max_size(2)
        .acquire_timeout(Duration::from_millis(50))
}

async fn open_pool(options: PoolOptions) -> (Pool<FakeManager>, Arc<FakeServer>) {
    let server = FakeServer::new();
    let manager = FakeManager {
        server: Arc::clone(&server),
    };
    let pool = Pool::open(options, manager).await.unwrap();
    (pool, server)
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_times_out_when_pool_is_exhausted() {
    let (pool, _server) = open_pool(quick_options()).await;

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::PoolTimeout(_)));
    assert_eq!(pool.status().acquire_timeouts, 1);

    drop(a);
    drop(b);
}

#[tokio::test]
async fn dropping_a_lease_frees_capacity() {
    let (pool, _server) = open_pool(quick_options()).await;

    let a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();
    drop(a);

    // The dropped lease's slot is reusable immediately.
    let c = pool.acquire().await;
    assert!(c.is_ok());
    assert_eq!(pool.status().total, 2);
}

#[tokio::test]
async fn acquire_after_close_is_pool_closed() {
    let (pool, server) = open_pool(quick_options().min_size(1)).await;

    pool.close().await;
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire().await, Err(Error::PoolClosed)));
    // The prewarmed idle connection was closed on shutdown.
    assert_eq!(server.closes.load(Ordering::SeqCst), 1);

    // Close is idempotent.
    pool.close().await;
    assert_eq!(server.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lease_returned_after_close_is_not_reused() {
    let (pool, _server) = open_pool(quick_options()).await;

    let lease = pool.acquire().await.unwrap();
    pool.close().await;
    drop(lease);

    assert_eq!(pool.status().total, 0);
    assert_eq!(pool.status().closed, 1);
}

#[tokio::test]
async fn expired_connections_are_retired_not_reused() {
    let options = quick_options()
        .min_size(1)
        .max_lifetime(Duration::from_millis(0));
    let (pool, server) = open_pool(options).await;
    assert_eq!(server.connects.load(Ordering::SeqCst), 1);

    // The prewarmed connection has already outlived max_lifetime, so the
    // acquire retires it and establishes a fresh one.
    let lease = pool.acquire().await.unwrap();
    assert_eq!(server.connects.load(Ordering::SeqCst), 2);
    assert_eq!(pool.status().total, 1);
    drop(lease);

    // The returned lease is also past its lifetime and gets closed rather
    // than re-pooled.
    assert_eq!(pool.status().idle, 0);
    pool.close().await;
}

#[tokio::test]
async fn cancelled_acquire_while_waiting_leaks_no_capacity() {
    let (pool, _server) = open_pool(quick_options().max_size(1)).await;

    let holder = pool.acquire().await.unwrap();
    // Caller gives up before the pool's own deadline; the dropped future
    // must not consume the capacity it was waiting for.
    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), pool.acquire()).await;
    assert!(cancelled.is_err());

    drop(holder);
    assert!(pool.acquire().await.is_ok());
    assert_eq!(pool.status().total, 1);
}

#[tokio::test]
async fn cancelled_acquire_mid_connect_leaks_no_capacity() {
    let (pool, server) = open_pool(quick_options().max_size(1)).await;
    server.set_connect_delay(Duration::from_millis(100));

    // Cancellation lands while the fresh connect is in flight.
    let cancelled =
        tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
    assert!(cancelled.is_err());

    // Both the capacity permit and the connection slot were unwound, so a
    // plain acquire still succeeds and the books balance.
    server.set_connect_delay(Duration::ZERO);
    let lease = pool.acquire().await.unwrap();
    assert_eq!(pool.status().total, 1);
    assert_eq!(pool.status().checked_out, 1);
    drop(lease);
    assert_eq!(pool.status().checked_out, 0);
}

#[tokio::test]
async fn failed_connect_releases_the_capacity_slot() {
    let (pool, server) = open_pool(quick_options()).await;
    server.set_unreachable(true);

    assert!(matches!(pool.acquire().await, Err(Error::Connection(_))));
    assert_eq!(pool.status().total, 0);

    // Capacity was not leaked by the failure.
    server.set_unreachable(false);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn open_fails_when_prewarm_cannot_connect() {
    let server = FakeServer::new();
    server.set_unreachable(true);
    let manager = FakeManager {
        server: Arc::clone(&server),
    };

    let result = Pool::open(quick_options().min_size(1), manager).await;
    assert!(matches!(result, Err(Error::Connection(_))));
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

fn sample_users(count: i64) -> Vec<RawRow> {
    (1..=count)
        .map(|i| {
            vec![
                ("USER_ID".to_string(), Value::I64(i)),
                ("USER_NAME".to_string(), Value::String(format!("User {i}"))),
            ]
        })
        .collect()
}

async fn open_executor() -> (Executor<FakeManager>, Arc<FakeServer>) {
    let (pool, server) = open_pool(quick_options()).await;
    (Executor::new(pool), server)
}

#[tokio::test]
async fn read_maps_rows_onto_the_declared_schema() {
    let (executor, server) = open_executor().await;
    let stmt = Statement::read(
        "SELECT USER_ID, USER_NAME FROM USERS",
        &["USER_ID", "USER_NAME", "LAST_LOGIN"],
    );
    server.script_read(stmt.sql(), sample_users(2));

    let rows = executor.execute_read(&stmt).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<i64>("USER_ID").unwrap(), 1);
    // A declared column the backend did not return is an explicit null.
    assert!(rows[0].value("LAST_LOGIN").unwrap().is_null());
}

#[tokio::test]
async fn read_with_no_matches_is_an_empty_vec() {
    let (executor, _server) = open_executor().await;
    let stmt = Statement::read("SELECT USER_ID FROM USERS", &["USER_ID"]);

    let rows = executor.execute_read(&stmt).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn read_one_with_no_matches_is_none() {
    let (executor, _server) = open_executor().await;
    let stmt = Statement::read("SELECT USER_ID FROM USERS", &["USER_ID"]);

    assert_eq!(executor.execute_read_one(&stmt).await.unwrap(), None);
}

#[tokio::test]
async fn read_one_returns_only_the_first_row() {
    let (executor, server) = open_executor().await;
    let stmt = Statement::read(
        "SELECT USER_ID, USER_NAME FROM USERS",
        &["USER_ID", "USER_NAME"],
    );
    server.script_read(stmt.sql(), sample_users(3));

    let row = executor.execute_read_one(&stmt).await.unwrap().unwrap();
    assert_eq!(row.get::<String>("USER_NAME").unwrap(), "User 1");
}

#[tokio::test]
async fn write_returns_the_affected_count() {
    let (executor, _server) = open_executor().await;
    let stmt = catalog::users::touch_last_login(7);

    assert_eq!(executor.execute_write(&stmt).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_write_surfaces_the_error_and_keeps_the_connection() {
    let (executor, server) = open_executor().await;
    let stmt = catalog::releases::delete(42);
    // The backend sees the expanded positional form.
    server.fail_write("DELETE FROM RELEASES WHERE RELEASE_ID = ?");

    let err = executor.execute_write(&stmt).await.unwrap_err();
    assert!(matches!(err, Error::Statement(_)));

    // A statement failure is not a connectivity failure: the connection went
    // back to the idle list instead of being discarded.
    let status = executor.pool().status();
    assert_eq!(status.total, 1);
    assert_eq!(status.idle, 1);
}

#[tokio::test]
async fn connectivity_failure_discards_the_connection() {
    let (executor, server) = open_executor().await;
    let stmt = Statement::read("SELECT 1", &[]);

    // Establish one healthy pooled connection first.
    executor.execute_read(&stmt).await.unwrap();
    assert_eq!(executor.pool().status().total, 1);

    server.set_unreachable(true);
    let err = executor.execute_read(&stmt).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(executor.pool().status().total, 0);
}

#[tokio::test]
async fn unbound_parameter_fails_before_touching_the_pool() {
    let (executor, server) = open_executor().await;
    let stmt = Statement::write("DELETE FROM RELEASES WHERE RELEASE_ID = :release_id");

    let err = executor.execute_write(&stmt).await.unwrap_err();
    assert!(matches!(err, Error::UnboundParameter(_)));
    assert_eq!(server.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_check_reports_connectivity() {
    let (executor, server) = open_executor().await;

    assert!(executor.health_check().await);
    // Repeated probes with no state change agree.
    assert!(executor.health_check().await);

    server.set_unreachable(true);
    assert!(!executor.health_check().await);
    assert!(!executor.health_check().await);

    server.set_unreachable(false);
    assert!(executor.health_check().await);
}

#[tokio::test]
async fn health_check_is_false_after_close() {
    let (executor, _server) = open_executor().await;
    executor.pool().close().await;
    assert!(!executor.health_check().await);
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_facade_routes_through_the_executor() {
    let (pool, server) = open_pool(quick_options()).await;
    let db = Database::live(Executor::new(pool));

    let stmt = catalog::projects::list();
    server.script_read(
        stmt.sql(),
        vec![vec![
            ("PROJECT_ID".to_string(), Value::I64(1)),
            ("PROJECT_NAME".to_string(), Value::String("Atlas".into())),
        ]],
    );

    let rows = db.query_many(&stmt).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("PROJECT_NAME").unwrap(), "Atlas");

    assert_eq!(db.mutate(&catalog::users::touch_last_login(1)).await.unwrap(), 1);
    assert!(db.health_check().await);

    db.close().await;
    assert!(!db.health_check().await);
    assert!(matches!(
        db.query_many(&stmt).await,
        Err(Error::PoolClosed)
    ));
}

#[tokio::test]
async fn mock_mode_connects_to_the_seeded_fixture() {
    let config = DbConfig::default().mock_mode(true);
    let db = Database::connect(config).await.unwrap();

    let projects = db.query_many(&catalog::projects::list()).await.unwrap();
    assert_eq!(projects.len(), 3);

    let releases = db
        .query_many(&catalog::releases::for_project(1))
        .await
        .unwrap();
    assert_eq!(releases.len(), 2);
    assert_eq!(releases[0].get::<String>("RELEASE_NAME").unwrap(), "2025.Q3");

    let stats = db
        .query_one(&catalog::dashboard::zephyr_stats(1, 101))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.get::<i64>("TOTAL_TEST_CASES").unwrap(), 245);
    assert_eq!(stats.get::<i64>("PASS_RATE").unwrap(), 92);

    let jira = db
        .query_one(&catalog::dashboard::jira_stats(1, 101))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(jira.get::<i64>("OPEN_ISSUES").unwrap(), 42);

    // Unregistered reads are empty, not errors, and writes succeed.
    let unknown = db.query_many(&catalog::users::list()).await.unwrap();
    assert!(unknown.is_empty());
    assert_eq!(db.mutate(&catalog::projects::insert(9, "New")).await.unwrap(), 1);
    assert!(db.health_check().await);
}

#[tokio::test]
async fn fixture_rows_render_handler_shaped_json() {
    let db = Database::connect(DbConfig::default().mock_mode(true))
        .await
        .unwrap();

    let releases = db
        .query_many(&catalog::releases::for_project(1))
        .await
        .unwrap();
    let json = releases[0].to_json();
    assert_eq!(json["RELEASE_NAME"], serde_json::json!("2025.Q3"));
    // Columns with no value are explicit nulls in the payload.
    assert_eq!(json["CONFLUENCE_PAGEID"], serde_json::Value::Null);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_respect_the_pool_bound() {
    let (pool, server) = open_pool(quick_options().max_size(2).acquire_timeout(Duration::from_secs(5))).await;
    let executor = Arc::new(Executor::new(pool));

    let stmt = Statement::read("SELECT USER_ID FROM USERS", &["USER_ID"]);
    server.script_read(stmt.sql(), sample_users(1));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let executor = Arc::clone(&executor);
            let stmt = stmt.clone();
            tokio::spawn(async move { executor.execute_read(&stmt).await })
        })
        .collect();

    for task in tasks {
        let rows = task.await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
    }

    let status = executor.pool().status();
    assert!(status.total <= 2);
    assert_eq!(status.checked_out, 0);
}
