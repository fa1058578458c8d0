//! Session defaults configured on the pool

use poolside_core::IsolationLevel;
use serde::{Deserialize, Serialize};

/// The session settings every borrowed connection starts from
///
/// A logical connection compares each setting the caller changes against
/// these values, and restores the ones that differ before the physical
/// connection goes back to the pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Auto-commit mode
    pub auto_commit: bool,

    /// Read-only mode
    pub read_only: bool,

    /// Transaction isolation level
    pub transaction_isolation: IsolationLevel,

    /// Default catalog; `None` leaves the driver's own default in place
    pub catalog: Option<String>,
}

impl SessionDefaults {
    pub fn new() -> Self {
        Self {
            auto_commit: true,
            read_only: false,
            transaction_isolation: IsolationLevel::default(),
            catalog: None,
        }
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_transaction_isolation(mut self, level: IsolationLevel) -> Self {
        self.transaction_isolation = level;
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }
}

impl Default for SessionDefaults {
    /// Auto-commit on, read-write, READ COMMITTED, no catalog
    fn default() -> Self {
        Self::new()
    }
}
