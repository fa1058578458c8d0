//! Tracking of session settings changed away from the pool defaults

use bitflags::bitflags;
use poolside_core::IsolationLevel;

use crate::config::SessionDefaults;

bitflags! {
    /// Session settings that currently differ from the pool defaults
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtySettings: u8 {
        const AUTO_COMMIT = 1 << 0;
        const READ_ONLY = 1 << 1;
        const TRANSACTION_ISOLATION = 1 << 2;
        const CATALOG = 1 << 3;
    }
}

/// A call that puts one session setting back to its pool default
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRestore {
    ReadOnly(bool),
    AutoCommit(bool),
    TransactionIsolation(IsolationLevel),
    Catalog(String),
}

/// Records which session settings a borrower left away from the defaults.
///
/// Each `record_*` call stores whether the value just applied differs from
/// the default; setting a value back to its default clears the flag again,
/// so no restore is issued for it on release.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    settings: DirtySettings,
    any_dirty: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_auto_commit(&mut self, value: bool, defaults: &SessionDefaults) {
        self.mark(DirtySettings::AUTO_COMMIT, value != defaults.auto_commit);
    }

    pub fn record_read_only(&mut self, value: bool, defaults: &SessionDefaults) {
        self.mark(DirtySettings::READ_ONLY, value != defaults.read_only);
    }

    pub fn record_transaction_isolation(
        &mut self,
        level: IsolationLevel,
        defaults: &SessionDefaults,
    ) {
        self.mark(
            DirtySettings::TRANSACTION_ISOLATION,
            level != defaults.transaction_isolation,
        );
    }

    /// A missing catalog differs from a configured one and vice versa.
    pub fn record_catalog(&mut self, catalog: Option<&str>, defaults: &SessionDefaults) {
        self.mark(DirtySettings::CATALOG, catalog != defaults.catalog.as_deref());
    }

    fn mark(&mut self, setting: DirtySettings, dirty: bool) {
        self.settings.set(setting, dirty);
        self.any_dirty = !self.settings.is_empty();
    }

    pub fn settings(&self) -> DirtySettings {
        self.settings
    }

    pub fn is_dirty(&self) -> bool {
        self.any_dirty
    }

    /// The restore calls to issue before hand-back, in issue order.
    ///
    /// The catalog is only restored when the pool configures one.
    pub fn restore_plan(&self, defaults: &SessionDefaults) -> Vec<SessionRestore> {
        if !self.any_dirty {
            return Vec::new();
        }

        let mut plan = Vec::new();
        if self.settings.contains(DirtySettings::READ_ONLY) {
            plan.push(SessionRestore::ReadOnly(defaults.read_only));
        }
        if self.settings.contains(DirtySettings::AUTO_COMMIT) {
            plan.push(SessionRestore::AutoCommit(defaults.auto_commit));
        }
        if self.settings.contains(DirtySettings::TRANSACTION_ISOLATION) {
            plan.push(SessionRestore::TransactionIsolation(
                defaults.transaction_isolation,
            ));
        }
        if self.settings.contains(DirtySettings::CATALOG) {
            if let Some(catalog) = &defaults.catalog {
                plan.push(SessionRestore::Catalog(catalog.clone()));
            }
        }
        plan
    }
}
