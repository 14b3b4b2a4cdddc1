//! Backoff policy for the dispatch retry loop
//!
//! Delays grow exponentially with the number of failed attempts on the same
//! provider: `unit * base^(attempt - 1)`, so the default policy waits 1, 2, 4
//! units. Rate-limited failures may carry their own delay, which wins.

use crate::providers::error::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// First wait, in milliseconds
    pub unit_ms: u64,
    pub exponential_base: f64,
    pub max_delay_ms: Option<u64>,
    /// Fraction of the delay added or removed at random, 0.0 to 1.0
    pub jitter_factor: f64,
    /// Prefer the provider's `retry-after` over the computed delay
    pub respect_retry_after: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            unit_ms: 1000,
            exponential_base: 2.0,
            max_delay_ms: None,
            jitter_factor: 0.0,
            respect_retry_after: true,
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given unit and otherwise default settings
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            unit_ms: unit.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = Some(max_delay.as_millis() as u64);
        self
    }

    /// Delay after the `attempt`-th failure (1-based) on the same provider
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut delay = self.unit_ms as f64 * self.exponential_base.powi(exponent);
        if let Some(max) = self.max_delay_ms {
            delay = delay.min(max as f64);
        }

        if self.jitter_factor > 0.0 {
            let spread = delay * self.jitter_factor;
            delay = (delay + rand::thread_rng().gen_range(-spread..=spread)).max(0.0);
        }

        Duration::from_millis(delay as u64)
    }

    /// Delay after a failure, preferring the provider's retry-after hint
    pub fn delay_after(&self, attempt: u32, error: &ProviderError) -> Duration {
        if self.respect_retry_after {
            if let Some(retry_after) = error.retry_delay() {
                return retry_after;
            }
        }

        self.delay_for(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = BackoffPolicy::with_unit(Duration::from_millis(100));

        assert_eq!(policy.delay_for(1).as_millis(), 100);
        assert_eq!(policy.delay_for(2).as_millis(), 200);
        assert_eq!(policy.delay_for(3).as_millis(), 400);
        assert_eq!(policy.delay_for(0).as_millis(), 100);
    }

    #[test]
    fn test_max_delay_caps_growth() {
        let policy =
            BackoffPolicy::with_unit(Duration::from_millis(100)).with_max_delay(Duration::from_millis(250));

        assert_eq!(policy.delay_for(2).as_millis(), 200);
        assert_eq!(policy.delay_for(5).as_millis(), 250);
    }

    #[test]
    fn test_retry_after_respected() {
        let policy = BackoffPolicy::default();
        let error = ProviderError::RateLimit {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(5)),
        };

        assert_eq!(policy.delay_after(1, &error), Duration::from_secs(5));

        let policy = BackoffPolicy {
            respect_retry_after: false,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.delay_after(1, &error), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::with_unit(Duration::from_millis(1000)).with_jitter(0.1);
        for _ in 0..50 {
            let delay = policy.delay_for(1).as_millis();
            assert!((900..=1100).contains(&delay), "delay {} out of range", delay);
        }
    }
}
