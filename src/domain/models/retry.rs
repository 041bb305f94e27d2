#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
    /// Upper bound of the uniform jitter added to every sleep.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        return RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2,
            max_jitter: Duration::from_millis(500),
        };
    }
}

impl RetryPolicy {
    pub fn from_config() -> Result<RetryPolicy> {
        return RetryPolicy::parse(
            &Config::get(ConfigKey::MaxRetries),
            &Config::get(ConfigKey::RetryInitialDelay),
        );
    }

    pub fn parse(max_retries: &str, initial_delay_ms: &str) -> Result<RetryPolicy> {
        let max_retries = max_retries.parse::<u32>()?;
        let initial_delay_ms = initial_delay_ms.parse::<u64>()?;

        return Ok(RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            ..RetryPolicy::default()
        });
    }

    /// Attempts actually made. A policy configured with zero retries still
    /// makes the one call it was asked for.
    pub fn attempts(&self) -> u32 {
        return self.max_retries.max(1);
    }

    /// Base delay before the attempt following `attempt` (1-based), without
    /// jitter.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.saturating_pow(exponent);
        return self.initial_delay.saturating_mul(factor);
    }
}
