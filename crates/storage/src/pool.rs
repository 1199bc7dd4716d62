//! Connection pool
//!
//! Connections are a shared resource. Each logical operation acquires a
//! [`PooledConnection`] guard, which returns the connection to the pool on
//! every exit path, including errors and panics.
//!
//! # Reuse Rules
//!
//! - At most `max_idle` connections are kept; surplus ones are closed
//! - A connection that produced a transport failure (connection dropped or
//!   timed out) is discarded instead of returned
//! - Nothing is retried here; the failure reaches the caller

use crate::command::Command;
use crate::reply::Reply;
use crate::traits::{Backend, Connection};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_model_core::{StoreError, StoreResult};
use tracing::{debug, warn};

/// Default number of idle connections kept
pub const DEFAULT_MAX_IDLE: usize = 8;

/// A bounded pool of idle connections over one backend
pub struct ConnectionPool {
    backend: Arc<dyn Backend>,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    max_idle: usize,
    opened: AtomicU64,
    discarded: AtomicU64,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("backend", &self.backend.describe())
            .field("max_idle", &self.max_idle())
            .field("idle", &self.idle_count())
            .field("opened", &self.opened_count())
            .field("discarded", &self.discarded_count())
            .finish()
    }
}

impl ConnectionPool {
    /// Create a pool keeping at most `max_idle` idle connections
    pub fn new(backend: Arc<dyn Backend>, max_idle: usize) -> Self {
        Self {
            backend,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            opened: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Acquire a connection
    ///
    /// Returns an idle connection if one is available, opens a new one
    /// otherwise.
    pub fn acquire(&self) -> StoreResult<PooledConnection<'_>> {
        let pooled = self.idle.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => {
                let conn = self.backend.connect()?;
                self.opened.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "strata::model::store",
                    backend = %self.backend.describe(),
                    "Opened connection"
                );
                conn
            }
        };
        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
            broken: false,
        })
    }

    /// Return a connection to the pool
    ///
    /// The connection is kept if the pool has room, closed otherwise.
    fn release(&self, conn: Box<dyn Connection>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    /// Number of idle connections
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Maximum number of idle connections kept
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Connections opened over the pool's lifetime
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Connections discarded after a transport failure
    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Scoped handle to a pooled connection
///
/// Dropping the guard returns the connection to its pool.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Box<dyn Connection>>,
    broken: bool,
}

impl PooledConnection<'_> {
    /// Run a single command
    pub fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        let result = self.conn()?.execute(command);
        self.observe(&result);
        result
    }

    /// Run a batch as one indivisible unit
    pub fn execute_atomic(&mut self, commands: &[Command]) -> StoreResult<Vec<Reply>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.conn()?.execute_atomic(commands);
        self.observe(&result);
        result
    }

    fn conn(&mut self) -> StoreResult<&mut Box<dyn Connection>> {
        if self.broken {
            return Err(StoreError::Pool(
                "connection was discarded after a transport failure".to_string(),
            ));
        }
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::Pool("connection already released".to_string()))
    }

    fn observe<T>(&mut self, result: &StoreResult<T>) {
        if let Err(e) = result {
            if e.is_fatal_to_connection() {
                self.broken = true;
            }
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken {
            self.pool.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                target: "strata::model::store",
                backend = %self.pool.backend.describe(),
                "Discarding connection after transport failure"
            );
            drop(conn);
        } else {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Backend whose connections fail with the configured error
    struct FlakyBackend {
        fail_with: Mutex<Option<StoreError>>,
        connect_fails: AtomicBool,
    }

    impl FlakyBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail_with: Mutex::new(None),
                connect_fails: AtomicBool::new(false),
            })
        }
    }

    struct FlakyConnection {
        backend: Arc<FlakyBackend>,
    }

    impl Connection for FlakyConnection {
        fn execute(&mut self, _command: &Command) -> StoreResult<Reply> {
            match self.backend.fail_with.lock().clone() {
                Some(e) => Err(e),
                None => Ok(Reply::Status("OK".to_string())),
            }
        }

        fn execute_atomic(&mut self, commands: &[Command]) -> StoreResult<Vec<Reply>> {
            commands.iter().map(|c| self.execute(c)).collect()
        }
    }

    struct Handle(Arc<FlakyBackend>);

    impl Backend for Handle {
        fn connect(&self) -> StoreResult<Box<dyn Connection>> {
            if self.0.connect_fails.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("refused".to_string()));
            }
            Ok(Box::new(FlakyConnection {
                backend: Arc::clone(&self.0),
            }))
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn pool(max_idle: usize) -> (ConnectionPool, Arc<FlakyBackend>) {
        let flaky = FlakyBackend::new();
        let pool = ConnectionPool::new(Arc::new(Handle(Arc::clone(&flaky))), max_idle);
        (pool, flaky)
    }

    fn ping() -> Command {
        Command::SCard {
            key: "k".to_string(),
        }
    }

    #[test]
    fn test_connection_returned_on_drop() {
        let (pool, _) = pool(2);
        {
            let mut conn = pool.acquire().unwrap();
            conn.execute(&ping()).unwrap();
        }
        assert_eq!(pool.idle_count(), 1);
        {
            let _conn = pool.acquire().unwrap();
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.opened_count(), 1);
    }

    #[test]
    fn test_idle_bounded_by_max_idle() {
        let (pool, _) = pool(1);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.opened_count(), 2);
    }

    #[test]
    fn test_protocol_error_keeps_connection() {
        let (pool, flaky) = pool(2);
        *flaky.fail_with.lock() = Some(StoreError::Protocol("WRONGTYPE".to_string()));
        {
            let mut conn = pool.acquire().unwrap();
            assert!(conn.execute(&ping()).is_err());
        }
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.discarded_count(), 0);
    }

    #[test]
    fn test_transport_error_discards_connection() {
        let (pool, flaky) = pool(2);
        *flaky.fail_with.lock() = Some(StoreError::Timeout("read".to_string()));
        {
            let mut conn = pool.acquire().unwrap();
            assert!(conn.execute(&ping()).is_err());
            assert!(matches!(conn.execute(&ping()), Err(StoreError::Pool(_))));
        }
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.discarded_count(), 1);
    }

    #[test]
    fn test_connect_failure_surfaces() {
        let (pool, flaky) = pool(2);
        flaky.connect_fails.store(true, Ordering::SeqCst);
        assert!(matches!(pool.acquire(), Err(StoreError::Connection(_))));
    }

    #[test]
    fn test_debug_reports_counters() {
        let (pool, _) = pool(2);
        drop(pool.acquire().unwrap());
        let text = format!("{pool:?}");
        assert!(text.contains("opened: 1"), "{text}");
        assert!(text.contains("discarded: 0"), "{text}");
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (pool, flaky) = pool(1);
        *flaky.fail_with.lock() = Some(StoreError::Connection("eof".to_string()));
        let mut conn = pool.acquire().unwrap();
        assert!(conn.execute_atomic(&[]).unwrap().is_empty());
    }
}
