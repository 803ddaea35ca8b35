//! Sliding-window rate limiting for dispatch requests.
//!
//! # Algorithm
//! ```text
//! window = 10s, max_requests = 5
//! admit():
//!     drop timestamps older than the window
//!     retained >= max_requests → reject, record nothing
//!     otherwise               → record now, admit
//! ```
//!
//! # Design Decisions
//! - One global window shared by every caller of an engine
//! - Prune, check and append happen under one lock
//! - Pruning is lazy; no background timer

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Bounds the rate of accepted requests over a sliding time window.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Gate one request. Returns `false` when the window is full.
    pub fn admit(&self) -> bool {
        self.check().is_ok()
    }

    /// Like `admit`, but a rejection carries the time until a slot frees up.
    pub fn check(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        self.prune(&mut timestamps, now);

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            drop(timestamps);
            tracing::debug!(
                max_requests = self.max_requests,
                window_secs = self.window.as_secs(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(retry_after);
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Requests currently counted against the window.
    pub fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_default_limits() {
        let limiter = RateLimiter::default();
        for _ in 0..5 {
            assert!(limiter.admit());
        }
        assert!(!limiter.admit());
        assert_eq!(limiter.in_window(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_records_nothing() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        assert!(limiter.admit());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(limiter.admit());

        for _ in 0..10 {
            assert_eq!(limiter.check(), Err(Duration::from_secs(6)));
        }
        assert_eq!(limiter.in_window(), 2);

        // Only the first timestamp leaves the window.
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.admit());
        assert!(!limiter.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        for _ in 0..3 {
            assert!(limiter.admit());
        }
        assert!(!limiter.admit());

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(!limiter.admit());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(limiter.in_window(), 0);
        assert!(limiter.admit());
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let limiter = RateLimiter::new(0, Duration::from_secs(10));
        assert_eq!(limiter.check(), Err(Duration::from_secs(10)));
    }

    #[test]
    fn test_concurrent_admits_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..10).filter(|_| limiter.admit()).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 5);
    }
}
