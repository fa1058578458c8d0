//! Classification of driver errors that mean the physical connection is gone

use poolside_core::{PoolsideError, SqlError};

/// SQL state class for connection exceptions
pub const CONNECTION_LOST_PREFIX: &str = "08";

/// SQL states outside class 08 that also mean the session is unusable
pub const FATAL_SQL_STATES: &[&str] = &[
    "57P01", // admin shutdown
    "57P02", // crash shutdown
    "57P03", // cannot connect now
    "01002", // SQL92 disconnect error
    "JZ0C0", // Sybase disconnect error
    "JZ0C1", // Sybase disconnect error
];

/// Whether `sql_state` reports a lost or unusable connection
pub fn is_fatal_sql_state(sql_state: &str) -> bool {
    sql_state.starts_with(CONNECTION_LOST_PREFIX) || FATAL_SQL_STATES.contains(&sql_state)
}

/// Every link of the error's driver chain whose SQL state is fatal.
///
/// The whole chain is inspected, so a fatal cause buried behind a
/// non-fatal outer error is still found. Non-driver errors have no links.
pub fn fatal_links(error: &PoolsideError) -> Vec<&SqlError> {
    match error.as_sql_error() {
        Some(sql) => sql
            .chain()
            .filter(|link| link.sql_state().is_some_and(is_fatal_sql_state))
            .collect(),
        None => Vec::new(),
    }
}
