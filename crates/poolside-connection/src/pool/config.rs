//! Pool configuration types

use std::time::Duration;

use poolside_core::{PoolsideError, Result};
use serde::{Deserialize, Serialize};

use crate::config::SessionDefaults;

/// Configuration for a connection pool
///
/// Controls pool sizing, borrow timeout, leak detection, and the session
/// defaults borrowed connections are reset to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool name used in diagnostics
    #[serde(default = "default_name")]
    name: String,
    /// Maximum number of connections allowed in the pool
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    #[serde(default = "default_acquire_timeout_ms")]
    acquire_timeout_ms: u64,
    /// How long a connection may stay borrowed before a leak warning is logged
    #[serde(default)]
    leak_detection_threshold_ms: Option<u64>,
    /// Session settings every borrowed connection starts from
    #[serde(default)]
    session: SessionDefaults,
}

fn default_name() -> String {
    "poolside".to_string()
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl PoolConfig {
    /// Create a new pool configuration with the given maximum size
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn new(max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );

        Self {
            name: default_name(),
            max_size,
            acquire_timeout_ms: default_acquire_timeout_ms(),
            leak_detection_threshold_ms: None,
            session: SessionDefaults::default(),
        }
    }

    /// Load a configuration from TOML
    ///
    /// ```toml
    /// name = "reporting"
    /// max_size = 8
    /// leak_detection_threshold_ms = 60000
    ///
    /// [session]
    /// auto_commit = false
    /// transaction_isolation = "serializable"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PoolConfig = toml::from_str(source)
            .map_err(|e| PoolsideError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that deserialization cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PoolsideError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.leak_detection_threshold_ms == Some(0) {
            return Err(PoolsideError::Configuration(
                "leak_detection_threshold_ms must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Enable leak detection with the given threshold in milliseconds
    pub fn with_leak_detection_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.leak_detection_threshold_ms = Some(threshold_ms);
        self
    }

    pub fn with_session_defaults(mut self, session: SessionDefaults) -> Self {
        self.session = session;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the leak detection threshold as a Duration if enabled
    pub fn leak_detection_threshold(&self) -> Option<Duration> {
        self.leak_detection_threshold_ms.map(Duration::from_millis)
    }

    pub fn session_defaults(&self) -> &SessionDefaults {
        &self.session
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - leak detection: disabled
    /// - session: auto-commit, read-write, READ COMMITTED, no catalog
    fn default() -> Self {
        Self::new(10)
    }
}
