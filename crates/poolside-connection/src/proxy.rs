//! Logical connections lent out by the pool
//!
//! A [`ProxyConnection`] wraps one physical connection for the duration of a
//! borrow. It tracks what the borrower changes (session settings, open
//! statements, pending transactions), watches driver errors for signs that
//! the physical connection is broken, and on close puts everything back and
//! returns the physical connection to the pool through a [`PoolGateway`].
//!
//! # Example
//!
//! ```ignore
//! use poolside_core::Connection;
//!
//! let conn = pool.get().await?;
//! conn.set_auto_commit(false).await?;
//! let stmt = conn.prepare_statement("UPDATE t SET x = ?").await?;
//! stmt.execute(&[Value::Int64(1)]).await?;
//! // Rolls back, restores auto-commit, closes `stmt`, returns the connection
//! conn.close().await?;
//! ```

mod classifier;
mod connection;
mod dirty;
mod gateway;
mod registry;
mod state;
mod statement;


pub use classifier::{CONNECTION_LOST_PREFIX, FATAL_SQL_STATES, fatal_links, is_fatal_sql_state};
pub use connection::ProxyConnection;
pub use dirty::{DirtySettings, DirtyTracker, SessionRestore};
pub use gateway::{PoolEntry, PoolGateway};
pub use registry::HandleRegistry;
pub use state::Lifecycle;
pub use statement::{ProxyStatement, StatementKind};
