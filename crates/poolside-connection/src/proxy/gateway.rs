//! The boundary through which a logical connection returns its physical
//! connection to the pool

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use poolside_core::Connection;
use uuid::Uuid;

use super::state::ConnectionState;
use crate::config::SessionDefaults;

/// A physical connection as the pool tracks it
pub struct PoolEntry {
    id: Uuid,
    connection: Arc<dyn Connection>,
    created_at: Instant,
}

impl PoolEntry {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("driver", &self.connection.driver_name())
            .finish()
    }
}

/// What a logical connection needs from the pool that lent it
pub trait PoolGateway: Send + Sync {
    /// Pool name, for diagnostics
    fn name(&self) -> &str;

    /// Session settings every borrower starts from
    fn session_defaults(&self) -> &SessionDefaults;

    /// Take back a physical connection.
    ///
    /// Called exactly once per borrow. `force_evict` means the connection
    /// must be discarded rather than reused.
    fn release_connection(&self, entry: PoolEntry, force_evict: bool);
}

/// Hands the entry back to the pool when dropped, with whatever eviction
/// decision the connection state holds at that moment.
///
/// Dropping covers every way out of `close()`: normal return, early error
/// return, panic, and cancellation of the close future.
pub(crate) struct ReleaseGuard<'a> {
    entry: Option<PoolEntry>,
    pool: &'a dyn PoolGateway,
    state: &'a Mutex<ConnectionState>,
}

impl<'a> ReleaseGuard<'a> {
    pub(crate) fn new(
        entry: PoolEntry,
        pool: &'a dyn PoolGateway,
        state: &'a Mutex<ConnectionState>,
    ) -> Self {
        Self {
            entry: Some(entry),
            pool,
            state,
        }
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let force_evict = self.state.lock().force_evict();
            tracing::debug!(
                entry = %entry.id(),
                pool = %self.pool.name(),
                force_evict,
                "releasing connection to pool"
            );
            self.pool.release_connection(entry, force_evict);
        }
    }
}
