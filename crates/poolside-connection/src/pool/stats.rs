//! Point-in-time counters for a [`ConnectionPool`](super::ConnectionPool)

use serde::{Deserialize, Serialize};

/// A snapshot of how a pool's physical connections are spread out.
///
/// `total` counts only connections the pool currently owns: those lent out
/// as a [`ProxyConnection`](crate::ProxyConnection) plus those parked idle.
/// Evicted connections are gone and only show up in `evicted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    total: usize,
    /// Parked in the idle queue, ready for the next borrower
    idle: usize,
    /// Lent out and not yet handed back
    active: usize,
    /// Borrowers blocked in `get()` waiting for a permit
    waiting: usize,
    /// Discarded at hand-back: marked broken, dropped unclosed, or found
    /// already closed. Monotonic over the pool's lifetime.
    evicted: u64,
}

impl PoolStats {
    pub fn new(total: usize, idle: usize, active: usize, waiting: usize, evicted: u64) -> Self {
        Self {
            total,
            idle,
            active,
            waiting,
            evicted,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Share of owned connections currently lent out; an empty pool reports 0.0
    pub fn utilization(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => self.active as f64 / total as f64,
        }
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }
}
