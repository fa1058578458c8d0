//! Poolside Connection - Logical connections and pool hand-back
//!
//! This crate wraps pooled physical connections in [`ProxyConnection`]s that
//! restore session state, close leftover statements, roll back unfinished
//! transactions and evict broken connections before handing them back.

mod config;
pub mod leak;
pub mod pool;
pub mod proxy;

#[cfg(test)]
mod test_support;

pub use config::SessionDefaults;
pub use leak::{LeakDetector, LeakRegistration, NoLeakDetection};
pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats};
pub use proxy::{
    DirtySettings, Lifecycle, PoolEntry, PoolGateway, ProxyConnection, ProxyStatement,
    StatementKind, fatal_links, is_fatal_sql_state,
};
