//! Poolside Core - Driver-facing abstractions for the connection pool
//!
//! This crate provides the traits and types that database drivers implement
//! and that the pool's connection proxies wrap. It defines:
//!
//! - `Connection` - Trait for physical database connections
//! - `Statement` - Trait for statements created by a connection
//! - `PoolsideError` / `SqlError` - Errors carrying SQL states and cause chains
//! - `unwrap_connection` - Typed access to a connection behind wrapper layers
//! - Common types like `Value`, `Row`, `IsolationLevel`, `Savepoint`

mod connection;
mod error;
pub mod transaction;
mod types;

pub use connection::*;
pub use error::*;
pub use transaction::*;
pub use types::*;
