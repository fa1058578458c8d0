//! Connection pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use poolside_core::{Connection, PoolsideError, Result};
use tokio::sync::Semaphore;

use super::config::PoolConfig;
use super::stats::PoolStats;
use crate::config::SessionDefaults;
use crate::leak::LeakDetector;
use crate::proxy::{PoolEntry, PoolGateway, ProxyConnection};

/// Factory trait for creating new physical connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }
}

/// A connection pool that lends physical connections as [`ProxyConnection`]s
///
/// Borrowed connections come back through [`PoolGateway::release_connection`]
/// when the borrower closes them (or drops them without closing). Connections
/// released for eviction are closed in the background and never reused.
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Connection factory
    factory: Arc<dyn ConnectionFactory>,
    /// Available idle connections
    idle: Mutex<VecDeque<PoolEntry>>,
    /// One permit per connection that may still be lent out
    semaphore: Semaphore,
    leak_detector: LeakDetector,
    /// Number of active connections (borrowed from pool)
    active_count: AtomicUsize,
    /// Number of requests waiting for a connection
    waiting_count: AtomicUsize,
    evicted_count: AtomicU64,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Arc<Self> {
        let leak_detector = LeakDetector::new(config.name(), config.leak_detection_threshold());
        Arc::new(Self {
            semaphore: Semaphore::new(config.max_size()),
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            leak_detector,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
            evicted_count: AtomicU64::new(0),
        })
    }

    /// Borrow a connection from the pool
    ///
    /// This will:
    /// 1. Wait for capacity (at most `max_size` connections are lent at once)
    /// 2. Reuse an idle connection, or create a new one if none is available
    /// 3. Wrap it in a [`ProxyConnection`] that must be closed to return it
    ///
    /// Returns an error if the acquire timeout is exceeded or the factory fails.
    pub async fn get(self: &Arc<Self>) -> Result<ProxyConnection> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);

        let result = tokio::time::timeout(self.config.acquire_timeout(), async {
            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| PoolsideError::Connection("Pool semaphore closed".into()))?;

            let entry = match self.take_idle() {
                Some(entry) => entry,
                None => PoolEntry::new(self.factory.create().await?),
            };

            // Handed back through release_connection
            permit.forget();
            Ok::<_, PoolsideError>(entry)
        })
        .await;

        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        let entry = match result {
            Ok(entry) => entry?,
            Err(_) => {
                return Err(PoolsideError::Timeout(format!(
                    "Timed out waiting for connection (timeout: {:?})",
                    self.config.acquire_timeout()
                )));
            }
        };

        self.active_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(entry = %entry.id(), pool = %self.config.name(), "connection borrowed");

        let leak = self.leak_detector.register(entry.id());
        let gateway: Arc<dyn PoolGateway> = Arc::clone(self) as Arc<dyn PoolGateway>;
        Ok(ProxyConnection::new(entry, gateway, leak))
    }

    /// Pop the first idle connection that is still open
    fn take_idle(&self) -> Option<PoolEntry> {
        let mut idle = self.idle.lock();
        while let Some(entry) = idle.pop_front() {
            if !entry.connection().is_closed() {
                return Some(entry);
            }
            tracing::debug!(entry = %entry.id(), "discarding idle connection closed underneath the pool");
        }
        None
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        let evicted = self.evicted_count.load(Ordering::SeqCst);
        PoolStats::new(idle + active, idle, active, waiting, evicted)
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let entries: Vec<_> = {
            let mut idle = self.idle.lock();
            idle.drain(..).collect()
        };

        for entry in entries {
            if let Err(e) = entry.connection().close().await {
                tracing::debug!(entry = %entry.id(), error = %e, "failed to close idle connection");
            }
        }
    }
}

impl PoolGateway for ConnectionPool {
    fn name(&self) -> &str {
        self.config.name()
    }

    fn session_defaults(&self) -> &SessionDefaults {
        self.config.session_defaults()
    }

    fn release_connection(&self, entry: PoolEntry, force_evict: bool) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        if force_evict || entry.connection().is_closed() {
            self.evicted_count.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                entry = %entry.id(),
                pool = %self.config.name(),
                force_evict,
                "evicting connection"
            );
            close_in_background(entry);
        } else {
            self.idle.lock().push_back(entry);
        }

        // After the idle push so a woken waiter finds the entry
        self.semaphore.add_permits(1);
    }
}

fn close_in_background(entry: PoolEntry) {
    if entry.connection().is_closed() {
        return;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::debug!(entry = %entry.id(), "no runtime available, dropping evicted connection unclosed");
        return;
    };
    runtime.spawn(async move {
        if let Err(e) = entry.connection().close().await {
            tracing::debug!(entry = %entry.id(), error = %e, "failed to close evicted connection");
        }
    });
}
