// Bounded exponential backoff for retryable sink errors

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "crate::config::duration_ms")]
    pub base: Duration,
    #[serde(with = "crate::config::duration_ms")]
    pub cap: Duration,
    /// Total attempts including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, given `attempt` failures so far.
    ///
    /// `base * 2^(attempt-1)`, raised to the sink's hint if it asked for
    /// longer, never above `cap`.
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let backoff = self.base.saturating_mul(1u32 << exp);
        backoff.max(hint.unwrap_or_default()).min(self.cap)
    }

    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
