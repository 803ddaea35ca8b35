//! Retry policy.
//!
//! # Responsibilities
//! - Decide how many tries each provider gets (`max_retries + 1`)
//! - Decide how long to wait before the next try on the same provider
//!
//! # Design Decisions
//! - Every failure kind (provider error, open circuit, busy probe) consumes
//!   one try and triggers the same backoff
//! - No delay after a provider's last try; fallback is immediate

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Per-provider retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base_ms)
    }

    /// Total tries granted to each provider.
    pub fn tries_per_provider(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the try following the failed `try_index`, or `None` when
    /// that was the provider's last try.
    pub fn delay_after(&self, try_index: u32) -> Option<Duration> {
        if try_index.saturating_add(1) >= self.tries_per_provider() {
            None
        } else {
            Some(calculate_backoff(try_index, self.backoff_base_ms))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
