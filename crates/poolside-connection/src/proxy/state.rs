//! Mutable per-borrow state of a logical connection
//!
//! Every flag that must only move one way is changed through a named
//! transition here, never assigned directly.

use poolside_core::IsolationLevel;

use super::dirty::DirtyTracker;
use crate::config::SessionDefaults;

/// Lifecycle of a logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closed,
}

#[derive(Debug)]
pub(crate) struct ConnectionState {
    lifecycle: Lifecycle,
    force_evict: bool,
    commit_pending: bool,
    /// Auto-commit mode last applied to the physical session
    auto_commit: bool,
    dirty: DirtyTracker,
}

impl ConnectionState {
    pub(crate) fn new(defaults: &SessionDefaults) -> Self {
        Self {
            lifecycle: Lifecycle::Open,
            force_evict: false,
            commit_pending: false,
            auto_commit: defaults.auto_commit,
            dirty: DirtyTracker::new(),
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lifecycle == Lifecycle::Closed
    }

    /// Move to `Closed`; returns false if already closed.
    pub(crate) fn mark_closed(&mut self) -> bool {
        match self.lifecycle {
            Lifecycle::Open => {
                self.lifecycle = Lifecycle::Closed;
                true
            }
            Lifecycle::Closed => false,
        }
    }

    pub(crate) fn mark_evict(&mut self) {
        self.force_evict = true;
    }

    pub(crate) fn force_evict(&self) -> bool {
        self.force_evict
    }

    /// Note that work ran on the session; only matters outside auto-commit.
    pub(crate) fn mark_commit_pending(&mut self) {
        if !self.auto_commit {
            self.commit_pending = true;
        }
    }

    pub(crate) fn clear_commit_pending(&mut self) {
        self.commit_pending = false;
    }

    pub(crate) fn is_commit_pending(&self) -> bool {
        self.commit_pending
    }

    pub(crate) fn record_auto_commit(&mut self, auto_commit: bool, defaults: &SessionDefaults) {
        self.auto_commit = auto_commit;
        self.dirty.record_auto_commit(auto_commit, defaults);
    }

    pub(crate) fn record_read_only(&mut self, read_only: bool, defaults: &SessionDefaults) {
        self.dirty.record_read_only(read_only, defaults);
    }

    pub(crate) fn record_transaction_isolation(
        &mut self,
        level: IsolationLevel,
        defaults: &SessionDefaults,
    ) {
        self.dirty.record_transaction_isolation(level, defaults);
    }

    pub(crate) fn record_catalog(&mut self, catalog: Option<&str>, defaults: &SessionDefaults) {
        self.dirty.record_catalog(catalog, defaults);
    }

    pub(crate) fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }
}
