//! Connection pool lending [`ProxyConnection`](crate::proxy::ProxyConnection)s
//!
//! A minimal pool that exercises the hand-back contract: bounded size,
//! acquire timeout, idle reuse, eviction on release, and optional leak
//! detection.
//!
//! # Example
//!
//! ```ignore
//! use poolside_connection::pool::{ConnectionPool, PoolConfig, ConnectionFactory};
//! use poolside_core::Connection;
//!
//! let pool = ConnectionPool::new(PoolConfig::new(10), MyFactory::new());
//! let conn = pool.get().await?;
//! conn.query("SELECT 1", &[]).await?;
//! conn.close().await?;
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool};
pub use stats::PoolStats;
