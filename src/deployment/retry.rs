//! Linear retry schedule for deployment attempts.

use crate::config::DeploymentConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff multiplier; attempt `n` (1-based) waits `n * backoff_unit` before retrying
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(config.max_retries, config.backoff_unit())
    }

    /// Attempts made before giving up
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after the failed attempt numbered `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }

    /// Whether another attempt follows the failed attempt numbered `attempt`
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.total_attempts()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(5))
    }
}
