//! Exponential backoff for connection-level failures.

use crate::config::BridgeConfig;
use std::sync::Arc;
use std::time::Duration;

/// How the retry loop waits between attempts. Swappable for tests.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

pub fn thread_sleeper() -> Sleeper {
    Arc::new(std::thread::sleep)
}

/// Doubling backoff with no jitter and no overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Total sleep accumulated by `retries` retries.
    pub fn total_delay(&self, retries: u32) -> Duration {
        (0..retries).fold(Duration::ZERO, |acc, r| acc.saturating_add(self.delay_for(r)))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}
