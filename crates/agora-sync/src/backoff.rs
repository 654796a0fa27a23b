//! Bounded exponential reconnect policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default number of retries before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff with a hard ceiling on attempts
///
/// Failure `n` (1-based) is retried after `base_delay * 2^(n-1)` as long as
/// `n <= max_attempts`. Failure `max_attempts + 1` is not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before retrying after the `failure`-th consecutive failure,
    /// or `None` once the budget is spent
    pub fn delay_for(&self, failure: u32) -> Option<Duration> {
        if failure == 0 || failure > self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(failure - 1)?;
        self.base_delay.checked_mul(factor)
    }

    /// All retry delays in order, for diagnostics
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts)
            .filter_map(|n| self.delay_for(n))
            .collect()
    }
}
