//! Savepoint handles
//!
//! A savepoint is a named point within a transaction that can be rolled
//! back to without aborting the entire transaction.

/// A savepoint within a transaction.
///
/// Returned by `Connection::set_savepoint` and passed back to
/// `Connection::rollback_to_savepoint` / `Connection::release_savepoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    /// Create a new savepoint with the given name.
    ///
    /// Savepoint names should follow database-specific naming rules.
    /// Most databases allow alphanumeric names with underscores.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the name of the savepoint.
    pub fn name(&self) -> &str {
        &self.name
    }
}
