//! Connection and statement traits implemented by database drivers

use std::any::Any;
use std::time::Duration;

use async_trait::async_trait;

use crate::{IsolationLevel, PoolsideError, QueryResult, Result, Savepoint, StatementResult, Value};

/// A physical database connection
///
/// Drivers implement this for the object that actually performs I/O. Pool
/// wrappers implement it too, exposing the wrapped connection through
/// [`Connection::inner_connection`] so callers can reach driver-specific
/// capabilities with [`unwrap_connection`].
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Prepare a statement for repeated execution
    async fn prepare_statement(&self, sql: &str) -> Result<Box<dyn Statement>>;

    /// Prepare a stored-procedure call
    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let _ = sql;
        Err(PoolsideError::NotSupported(format!(
            "{} does not support callable statements",
            self.driver_name()
        )))
    }

    async fn auto_commit(&self) -> Result<bool>;

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    async fn read_only(&self) -> Result<bool>;

    async fn set_read_only(&self, read_only: bool) -> Result<()>;

    async fn transaction_isolation(&self) -> Result<IsolationLevel>;

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<()>;

    async fn catalog(&self) -> Result<Option<String>>;

    async fn set_catalog(&self, catalog: Option<&str>) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Create a named savepoint in the current transaction
    async fn set_savepoint(&self, name: &str) -> Result<Savepoint>;

    /// Undo everything done after `savepoint` was created
    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()>;

    /// Forget a savepoint
    async fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()>;

    /// Check that the connection still works, waiting at most `timeout`
    async fn is_valid(&self, timeout: Duration) -> Result<bool>;

    /// Discard warnings the driver accumulated on this session
    async fn clear_warnings(&self) -> Result<()> {
        Ok(())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// The concrete connection object, for typed downcasts
    fn as_any(&self) -> &dyn Any;

    /// The connection this one wraps, if it is a wrapper
    fn inner_connection(&self) -> Option<&dyn Connection> {
        None
    }
}

/// A statement created by a connection
#[async_trait]
pub trait Statement: Send + Sync {
    /// The SQL text this statement was prepared from
    fn sql(&self) -> &str;

    /// Execute the statement with parameters
    async fn execute(&self, params: &[Value]) -> Result<StatementResult>;

    /// Query the statement with parameters
    async fn query(&self, params: &[Value]) -> Result<QueryResult>;

    /// Close/deallocate the statement
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Upper bound on how many wrapper layers [`wrapper_chain`] will descend.
pub const MAX_WRAPPER_DEPTH: usize = 16;

/// Iterate `conn` and every connection it wraps, outermost first.
pub fn wrapper_chain<'a>(conn: &'a dyn Connection) -> impl Iterator<Item = &'a dyn Connection> {
    std::iter::successors(Some(conn), |c: &&'a dyn Connection| {
        let c: &'a dyn Connection = *c;
        c.inner_connection()
    })
    .take(MAX_WRAPPER_DEPTH)
}

/// Find the first connection of type `T` in the wrapper chain starting at `conn`.
pub fn unwrap_connection<T: Any>(conn: &dyn Connection) -> Option<&T> {
    wrapper_chain(conn).find_map(|c| c.as_any().downcast_ref::<T>())
}

/// Whether a connection of type `T` appears in the wrapper chain starting at `conn`.
pub fn is_wrapper_for<T: Any>(conn: &dyn Connection) -> bool {
    unwrap_connection::<T>(conn).is_some()
}
