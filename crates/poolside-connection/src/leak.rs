//! Leak detection for borrowed connections
//!
//! When a connection is borrowed, the pool registers it with a
//! [`LeakDetector`]. If the borrower has not closed it before the configured
//! threshold elapses, a warning is logged. Closing the connection cancels the
//! registration.

use std::time::Duration;

use tokio::task::AbortHandle;
use uuid::Uuid;

/// A cancellable leak-detection registration
pub trait LeakRegistration: Send + Sync {
    /// Stop watching the connection. Calling it again has no effect.
    fn cancel(&self);
}

/// Registration used when leak detection is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLeakDetection;

impl LeakRegistration for NoLeakDetection {
    fn cancel(&self) {}
}

/// A pending leak warning scheduled on the tokio timer
#[derive(Debug)]
pub struct LeakTimer {
    handle: AbortHandle,
}

impl LeakRegistration for LeakTimer {
    fn cancel(&self) {
        self.handle.abort();
    }
}

/// Schedules leak warnings for borrowed connections
#[derive(Debug, Clone)]
pub struct LeakDetector {
    pool_name: String,
    threshold: Option<Duration>,
}

impl LeakDetector {
    /// Create a detector; `None` disables detection
    pub fn new(pool_name: impl Into<String>, threshold: Option<Duration>) -> Self {
        Self {
            pool_name: pool_name.into(),
            threshold,
        }
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }

    /// Start watching a freshly borrowed connection.
    ///
    /// Must be called from within a tokio runtime when detection is enabled.
    pub fn register(&self, connection_id: Uuid) -> Box<dyn LeakRegistration> {
        let Some(threshold) = self.threshold else {
            return Box::new(NoLeakDetection);
        };

        let pool = self.pool_name.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(threshold).await;
            tracing::warn!(
                connection = %connection_id,
                pool = %pool,
                threshold_ms = threshold.as_millis() as u64,
                "connection leak detection triggered, connection has not been returned to the pool"
            );
        });

        Box::new(LeakTimer {
            handle: task.abort_handle(),
        })
    }
}
