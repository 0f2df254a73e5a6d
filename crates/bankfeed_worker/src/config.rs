//! Worker configuration.

use crate::backoff::BackoffPolicy;
use std::time::Duration;

/// Configuration for the worker and dispatch fan-out.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// A connection is due for incremental sync once its last successful
    /// sync is older than this.
    pub sync_interval: Duration,
    /// Retry and snooze delay policy.
    pub backoff: BackoffPolicy,
    /// Attempts after which the queue gives up on a job.
    pub max_attempts: u32,
}

impl WorkerConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            sync_interval: Duration::from_secs(6 * 60 * 60),
            backoff: BackoffPolicy::default(),
            max_attempts: 5,
        }
    }

    /// Sets the incremental-sync due interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the maximum attempt count.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}
