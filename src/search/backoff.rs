//! Exponential backoff between retries of a failing page fetch

use crate::config::RetrySettings;
use std::time::Duration;

/// Retry constants applied to every page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First wait, in seconds
    pub wait_first_secs: u64,
    /// Factor applied to the wait after each sleep
    pub wait_multiplier: u64,
    /// Ceiling for a single wait, in seconds
    pub wait_max_secs: u64,
    /// Consecutive waits after which the next credential is tried
    pub max_num_waits: u32,
    /// Give up on a page after this many failed attempts; `None` retries forever
    pub max_attempts_per_page: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            wait_first_secs: settings.wait_first_secs,
            wait_multiplier: settings.wait_multiplier,
            wait_max_secs: settings.wait_max_secs,
            max_num_waits: settings.max_num_waits,
            max_attempts_per_page: settings.max_attempts_per_page,
        }
    }
}

/// Backoff state of the page being fetched
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    interval_secs: u64,
    consecutive_waits: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            interval_secs: policy.wait_first_secs,
            consecutive_waits: 0,
            policy,
        }
    }

    /// Back to the first interval with no waits recorded
    pub fn reset(&mut self) {
        self.interval_secs = self.policy.wait_first_secs;
        self.consecutive_waits = 0;
    }

    /// The wait the next call to [`advance`](Self::advance) will return
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn consecutive_waits(&self) -> u32 {
        self.consecutive_waits
    }

    /// Take the current wait and step the state forward: the interval grows
    /// by the multiplier up to the ceiling and one more wait is counted.
    pub fn advance(&mut self) -> Duration {
        let wait = self.interval();
        self.interval_secs = self
            .interval_secs
            .saturating_mul(self.policy.wait_multiplier)
            .min(self.policy.wait_max_secs);
        self.consecutive_waits = self.consecutive_waits.saturating_add(1);
        wait
    }

    /// Whether enough waits have piled up to try another credential
    pub fn should_rotate(&self) -> bool {
        self.consecutive_waits >= self.policy.max_num_waits
    }
}
