//! Backend configuration.

use crate::error::{CoreError, CoreResult};
use std::time::Duration;

/// Default number of pending mutations that forces a commit at unlock.
pub const DEFAULT_BATCH_LIMIT: usize = 10_000;

/// Default period of the background committer.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for opening a [`crate::Backend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Pending mutation count at which releasing the batch lock commits.
    ///
    /// Checked only when the lock is released, so a single critical
    /// section can exceed it.
    pub batch_limit: usize,

    /// How often the background committer flushes pending mutations
    /// (`Duration::ZERO` = never).
    pub batch_interval: Duration,

    /// Cache size handed to the redb store, in bytes (`None` = redb default).
    pub cache_size: Option<usize>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            cache_size: None,
        }
    }
}

impl BackendConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the commit threshold.
    #[must_use]
    pub const fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Sets the background commit interval.
    #[must_use]
    pub const fn batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Sets the redb cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Checks that the configuration can drive a backend.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `batch_limit` is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_limit == 0 {
            return Err(CoreError::invalid_config("batch_limit must be at least 1"));
        }
        Ok(())
    }
}
