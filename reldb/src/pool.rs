//! Bounded connection pool
//!
//! Owns every pooling decision itself (the live backend hands it raw,
//! unpooled driver connections): capacity gating via a semaphore, an idle
//! list under a plain mutex, lifetime/idle retirement, and an RAII lease
//! guard whose `Drop` releases synchronously so a cancelled task can never
//! leak a handle or a permit.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Creates and tears down physical connections on behalf of the pool.
///
/// This is the seam between pooling policy and the driver: the live backend
/// implements it over `mysql_async`, tests implement it with an in-memory
/// fake.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    /// The physical connection type.
    type Conn: Send + 'static;

    /// Establish a new physical connection.
    async fn connect(&self) -> Result<Self::Conn>;

    /// Gracefully close a connection. Errors are the manager's problem;
    /// the pool has already forgotten the handle.
    async fn close(&self, conn: Self::Conn);
}

/// Pool sizing and lifecycle options.
///
/// Defaults mirror the dashboard's production configuration: min 2, max 10,
/// grow-by 1, 30s acquire timeout, 10min idle timeout, 1h max lifetime.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Connections kept ready; the pool replenishes toward this floor.
    pub min_size: usize,
    /// Hard cap on simultaneously existing connections.
    pub max_size: usize,
    /// Batch size when replenishing toward `min_size`.
    pub increment: usize,
    /// Maximum time `acquire` waits for capacity.
    pub acquire_timeout: Duration,
    /// Idle connections older than this are retired at acquire time.
    pub idle_timeout: Duration,
    /// Connections older than this are retired instead of being reused.
    pub max_lifetime: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            increment: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

impl PoolOptions {
    /// Set the minimum number of pooled connections.
    pub fn min_size(mut self, min: usize) -> Self {
        self.min_size = min;
        self
    }

    /// Set the maximum number of pooled connections.
    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = max;
        self
    }

    /// Set the replenish batch size.
    pub fn increment(mut self, increment: usize) -> Self {
        self.increment = increment;
        self
    }

    /// Set the maximum time to wait for a free connection.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle TTL.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the absolute connection TTL.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Config("max_size must be at least 1".into()));
        }
        if self.min_size > self.max_size {
            return Err(Error::Config(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}

/// Point-in-time pool observability snapshot.
#[derive(Debug, Clone, Default)]
pub struct PoolStatus {
    /// Physical connections currently existing (idle + checked out).
    pub total: usize,
    /// Connections sitting in the idle list.
    pub idle: usize,
    /// Connections currently leased out.
    pub checked_out: usize,
    /// Connections created over the pool's lifetime.
    pub created: u64,
    /// Connections closed over the pool's lifetime.
    pub closed: u64,
    /// Acquire attempts that hit the deadline.
    pub acquire_timeouts: u64,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    closed: AtomicU64,
    acquire_timeouts: AtomicU64,
}

struct Idle<C> {
    conn: C,
    created_at: Instant,
    last_used: Instant,
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    options: PoolOptions,
    /// Idle connections, LIFO. A std mutex so the lease guard's `Drop` can
    /// return connections without touching the async runtime.
    idle: Mutex<Vec<Idle<M::Conn>>>,
    /// Permits bound the checked-out count at `max_size`.
    semaphore: Semaphore,
    /// Existing physical connections (idle + checked out). Never exceeds
    /// `max_size`.
    total: AtomicUsize,
    shutdown: AtomicBool,
    counters: Counters,
}

impl<M: ConnectionManager> PoolInner<M> {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<Idle<M::Conn>>> {
        // Recover from poisoning: the idle list itself stays consistent even
        // if a holder panicked between operations.
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return a lease to the idle list, or retire it if the pool is closing
    /// or the connection outlived `max_lifetime`. Runs synchronously in the
    /// guard's `Drop`; the permit is put back last so a waiter that wakes up
    /// will find the connection already in the idle list.
    fn restore(inner: &Arc<Self>, conn: M::Conn, created_at: Instant) {
        if inner.shutdown.load(Ordering::Acquire)
            || created_at.elapsed() >= inner.options.max_lifetime
        {
            Self::dispose(inner, conn);
        } else {
            inner.lock_idle().push(Idle {
                conn,
                created_at,
                last_used: Instant::now(),
            });
        }
        inner.semaphore.add_permits(1);
    }

    /// Forget a connection: fix the books now, close it in the background.
    fn dispose(inner: &Arc<Self>, conn: M::Conn) {
        inner.total.fetch_sub(1, Ordering::AcqRel);
        inner.counters.closed.fetch_add(1, Ordering::Relaxed);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(inner);
            handle.spawn(async move {
                inner.manager.close(conn).await;
            });
        }
        // Without a runtime (process teardown) the connection is dropped
        // without a graceful close.
    }

    /// Reserve a slot for a new physical connection, keeping
    /// `total <= limit`.
    fn try_reserve(&self, limit: usize) -> bool {
        self.total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                (t < limit).then_some(t + 1)
            })
            .is_ok()
    }
}

/// Unwinds a [`PoolInner::try_reserve`] slot unless kept, so a caller
/// cancelled while establishing a connection gives the slot back.
struct SlotReservation<'a> {
    total: &'a AtomicUsize,
    armed: bool,
}

impl<'a> SlotReservation<'a> {
    fn new(total: &'a AtomicUsize) -> Self {
        Self { total, armed: true }
    }

    /// Keep the slot: the connection was established and now backs it.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.total.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<M: ConnectionManager> PoolInner<M> {
    /// Top the idle list back up toward `min_size`, creating at most
    /// `increment` connections. Fire-and-forget.
    fn replenish(inner: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(inner);
        handle.spawn(async move {
            for _ in 0..inner.options.increment.max(1) {
                if inner.shutdown.load(Ordering::Acquire) {
                    break;
                }
                if !inner.try_reserve(inner.options.min_size) {
                    break;
                }
                match inner.manager.connect().await {
                    Ok(conn) => {
                        inner.counters.created.fetch_add(1, Ordering::Relaxed);
                        inner.lock_idle().push(Idle {
                            conn,
                            created_at: Instant::now(),
                            last_used: Instant::now(),
                        });
                        debug!("replenished idle connection");
                    }
                    Err(e) => {
                        inner.total.fetch_sub(1, Ordering::AcqRel);
                        warn!(error = %e, "failed to replenish connection pool");
                        break;
                    }
                }
            }
        });
    }
}

/// A bounded pool of database connections.
///
/// Cloning is cheap; all clones share the same pool. The pool is created
/// once at startup with [`Pool::open`] and torn down once with
/// [`Pool::close`]; there is no implicit global instance.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Open the pool and eagerly establish `min_size` connections.
    ///
    /// Fails if validation or any of the initial connections fails, closing
    /// whatever was already established.
    pub async fn open(options: PoolOptions, manager: M) -> Result<Self> {
        options.validate()?;
        let pool = Self {
            inner: Arc::new(PoolInner {
                semaphore: Semaphore::new(options.max_size),
                idle: Mutex::new(Vec::with_capacity(options.max_size)),
                total: AtomicUsize::new(0),
                shutdown: AtomicBool::new(false),
                counters: Counters::default(),
                manager,
                options,
            }),
        };

        for _ in 0..pool.inner.options.min_size {
            match pool.inner.manager.connect().await {
                Ok(conn) => {
                    pool.inner.total.fetch_add(1, Ordering::AcqRel);
                    pool.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                    pool.inner.lock_idle().push(Idle {
                        conn,
                        created_at: Instant::now(),
                        last_used: Instant::now(),
                    });
                }
                Err(e) => {
                    pool.close().await;
                    return Err(e);
                }
            }
        }

        info!(
            min = pool.inner.options.min_size,
            max = pool.inner.options.max_size,
            "connection pool opened"
        );
        Ok(pool)
    }

    /// Lease a connection, waiting up to `acquire_timeout` for capacity.
    ///
    /// The returned guard gives exclusive use of the connection and returns
    /// it on drop, on every exit path. Fails with [`Error::PoolTimeout`]
    /// when the deadline elapses and [`Error::PoolClosed`] after shutdown.
    pub async fn acquire(&self) -> Result<PooledConn<M>> {
        let inner = &self.inner;
        if inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        let permit = match tokio::time::timeout(
            inner.options.acquire_timeout,
            inner.semaphore.acquire(),
        )
        .await
        {
            Err(_) => {
                inner
                    .counters
                    .acquire_timeouts
                    .fetch_add(1, Ordering::Relaxed);
                warn!(
                    timeout_ms = inner.options.acquire_timeout.as_millis() as u64,
                    "timed out waiting for a pooled connection"
                );
                return Err(Error::PoolTimeout(inner.options.acquire_timeout));
            }
            // Semaphore closed by shutdown
            Ok(Err(_)) => return Err(Error::PoolClosed),
            Ok(Ok(permit)) => permit,
        };

        // The permit stays attached to this future until a connection is in
        // hand: if the caller is cancelled anywhere below (including mid
        // connect), dropping the permit restores capacity and the slot guard
        // unwinds the `total` reservation.
        let mut retired = 0usize;
        let leased = loop {
            let candidate = inner.lock_idle().pop();
            match candidate {
                Some(entry) => {
                    let expired = entry.created_at.elapsed() >= inner.options.max_lifetime
                        || entry.last_used.elapsed() >= inner.options.idle_timeout;
                    if expired {
                        retired += 1;
                        PoolInner::dispose(inner, entry.conn);
                        continue;
                    }
                    break (entry.conn, entry.created_at);
                }
                None => {
                    // Holding a permit guarantees a slot is ours unless a
                    // returning lease is mid-flight; in that case its entry
                    // shows up in the idle list momentarily.
                    if inner.try_reserve(inner.options.max_size) {
                        let slot = SlotReservation::new(&inner.total);
                        match inner.manager.connect().await {
                            Ok(conn) => {
                                slot.keep();
                                inner.counters.created.fetch_add(1, Ordering::Relaxed);
                                break (conn, Instant::now());
                            }
                            // `slot` unwinds the reservation; the permit is
                            // returned when it drops with the error.
                            Err(e) => return Err(e),
                        }
                    }
                    tokio::task::yield_now().await;
                }
            }
        };

        if retired > 0 {
            PoolInner::replenish(inner);
        }

        // From here the lease owns the capacity; it is restored in the
        // guard's Drop (or discard), exactly once.
        permit.forget();

        debug!("connection acquired from pool");
        Ok(PooledConn {
            conn: Some(leased.0),
            created_at: leased.1,
            inner: Arc::clone(inner),
        })
    }

    /// Shut the pool down: fail waiting and future acquires, close every
    /// idle connection. Leases still out are closed as they come back.
    pub async fn close(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.semaphore.close();
        let drained: Vec<Idle<M::Conn>> = self.inner.lock_idle().drain(..).collect();
        for entry in drained {
            self.inner.total.fetch_sub(1, Ordering::AcqRel);
            self.inner.counters.closed.fetch_add(1, Ordering::Relaxed);
            self.inner.manager.close(entry.conn).await;
        }
        info!("connection pool closed");
    }

    /// Whether [`Pool::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Snapshot of the pool's book-keeping.
    pub fn status(&self) -> PoolStatus {
        let total = self.inner.total.load(Ordering::Acquire);
        let idle = self.inner.lock_idle().len();
        PoolStatus {
            total,
            idle,
            checked_out: total.saturating_sub(idle),
            created: self.inner.counters.created.load(Ordering::Relaxed),
            closed: self.inner.counters.closed.load(Ordering::Relaxed),
            acquire_timeouts: self
                .inner
                .counters
                .acquire_timeouts
                .load(Ordering::Relaxed),
        }
    }
}

/// An exclusive lease on a pooled connection.
///
/// Dereferences to the physical connection. Dropping the guard returns the
/// connection to the pool synchronously; [`PooledConn::discard`] closes it
/// instead. One or the other happens exactly once.
pub struct PooledConn<M: ConnectionManager> {
    conn: Option<M::Conn>,
    created_at: Instant,
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> PooledConn<M> {
    /// Close the connection instead of returning it to the pool.
    ///
    /// Used after fatal (connectivity-class) errors where the session can no
    /// longer be trusted. The capacity slot is freed either way.
    pub async fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.inner.total.fetch_sub(1, Ordering::AcqRel);
            self.inner.counters.closed.fetch_add(1, Ordering::Relaxed);
            self.inner.manager.close(conn).await;
            self.inner.semaphore.add_permits(1);
            warn!("pooled connection discarded after fatal error");
        }
    }
}

// Manual impl: `M::Conn` need not be `Debug`.
impl<M: ConnectionManager> fmt::Debug for PooledConn<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConn")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl<M: ConnectionManager> Deref for PooledConn<M> {
    type Target = M::Conn;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("BUG: pooled connection used after release")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConn<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("BUG: pooled connection used after release")
    }
}

impl<M: ConnectionManager> Drop for PooledConn<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            PoolInner::restore(&self.inner, conn, self.created_at);
        }
    }
}
