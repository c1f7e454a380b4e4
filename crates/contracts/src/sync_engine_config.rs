//! Sync engine configuration contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default polling period (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default window capacity `N`
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Shortest allowed status refresh period (milliseconds)
pub const MIN_STATUS_REFRESH_MS: u64 = 100;

/// Sync engine configuration
///
/// Fixed at engine construction; there is no runtime reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Polling period while the simulation runs
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Maximum number of samples kept in the display window
    #[serde(default = "default_window_capacity")]
    #[validate(range(min = 1))]
    pub window_capacity: usize,

    /// Out-of-band status refresh period (0 = disabled, otherwise at least
    /// [`MIN_STATUS_REFRESH_MS`])
    #[serde(default)]
    #[validate(custom(function = "validate_status_refresh"))]
    pub status_refresh_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn validate_status_refresh(value: u64) -> Result<(), ValidationError> {
    if value == 0 || value >= MIN_STATUS_REFRESH_MS {
        return Ok(());
    }
    let mut error = ValidationError::new("status_refresh_floor");
    error.message = Some(
        format!("must be 0 (disabled) or at least {MIN_STATUS_REFRESH_MS} ms, got {value}").into(),
    );
    Err(error)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            status_refresh_ms: 0,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `None` when periodic status refresh is disabled
    pub fn status_refresh(&self) -> Option<Duration> {
        (self.status_refresh_ms > 0).then(|| Duration::from_millis(self.status_refresh_ms))
    }
}
