//! Retry/fallback dispatch across circuit-breaker-wrapped providers.
//!
//! # Algorithm
//! ```text
//! dispatch(payload, key):
//!     registry says delivered? → return the stored record
//!     atomically, under the key's map entry:
//!         record exists?       → return it (waiting if still pending)
//!         rate limiter full?   → Err(RateLimitExceeded), nothing recorded
//!         create pending record
//!     for provider in priority order:
//!         for try in 0..=max_retries:
//!             attempts += 1, stamp time
//!             send through breaker
//!             ok   → mark sent, return
//!             err  → not last try? sleep backoff_base * 2^try
//!     mark failed, return
//! ```
//!
//! # Design Decisions
//! - Tries within one dispatch are strictly sequential
//! - Circuit rejections consume a try and the same backoff as provider errors
//! - The try loop runs on its own task, so a dropped caller cannot leave a
//!   record pending forever
//! - Every shared resource has its own lock; none is held across an await

use std::sync::Arc;
use std::time::Instant;

use crate::config::MailgateConfig;
use crate::dispatch::status::{Registration, StatusTracker};
use crate::dispatch::types::{
    unix_millis, DispatchError, DispatchRecord, DispatchState, EmailPayload, IdempotencyKey,
};
use crate::dispatch::IdempotencyGuard;
use crate::observability::metrics;
use crate::providers::ProviderPort;
use crate::resilience::{CircuitBreaker, CircuitSnapshot, RetryPolicy};
use crate::security::RateLimiter;

/// Orchestrates idempotency, rate limiting and the retry/fallback loop.
///
/// Cloning is cheap; clones share all state.
#[derive(Debug, Clone)]
pub struct DispatchEngine {
    breakers: Arc<[CircuitBreaker]>,
    limiter: Arc<RateLimiter>,
    tracker: StatusTracker,
    retry: RetryPolicy,
}

impl DispatchEngine {
    /// Build an engine over `providers`, in priority order (primary first).
    pub fn new(providers: Vec<Arc<dyn ProviderPort>>, config: &MailgateConfig) -> Self {
        let breakers = providers
            .into_iter()
            .map(|provider| CircuitBreaker::new(provider, &config.circuit_breaker))
            .collect();

        Self {
            breakers,
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            tracker: StatusTracker::new(IdempotencyGuard::new()),
            retry: RetryPolicy::from_config(&config.retries),
        }
    }

    /// Dispatch `payload` under `key`.
    ///
    /// Fails only with `RateLimitExceeded`. Exhausting every provider is a
    /// normal outcome and yields a `failed` record.
    pub async fn dispatch(
        &self,
        payload: EmailPayload,
        key: IdempotencyKey,
    ) -> Result<DispatchRecord, DispatchError> {
        if let Some(record) = self.completed(&key) {
            tracing::debug!(key = %key, "Key already delivered, returning stored record");
            metrics::record_dispatch("duplicate");
            return Ok(record);
        }

        // The limiter is consulted only for a key with no record, under the
        // key's map entry, so duplicates never spend a slot.
        let registration = self.tracker.register_admitted(&key, || {
            self.limiter
                .check()
                .map_err(|retry_after| DispatchError::RateLimitExceeded { retry_after })
        });

        let handle = match registration {
            Ok(Registration::Created(handle)) => handle,
            Ok(Registration::Existing(existing)) => {
                tracing::debug!(key = %key, "Duplicate dispatch, returning existing record");
                metrics::record_dispatch("duplicate");
                return Ok(existing.settled().await);
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Dispatch rejected by rate limiter");
                metrics::record_rate_limited();
                return Err(err);
            }
        };

        tracing::info!(key = %key, id = %handle.current().id, "Dispatch accepted");

        let engine = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move { engine.run(payload, task_key).await });

        match task.await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Dispatch task aborted, marking failed");
                self.tracker.mark_failed(&key);
                metrics::record_dispatch("failed");
                Ok(handle.current())
            }
        }
    }

    /// Latest record for `key`, if any.
    pub fn get_status(&self, key: &IdempotencyKey) -> Option<DispatchRecord> {
        self.tracker.get(key)
    }

    /// Circuit state of every provider, in priority order.
    pub fn providers(&self) -> Vec<CircuitSnapshot> {
        self.breakers.iter().map(CircuitBreaker::snapshot).collect()
    }

    /// Stored record for a key the registry knows was delivered.
    fn completed(&self, key: &IdempotencyKey) -> Option<DispatchRecord> {
        if self.tracker.is_completed(key) {
            self.tracker.get(key)
        } else {
            None
        }
    }

    /// The retry/fallback loop for one admitted dispatch.
    async fn run(&self, payload: EmailPayload, key: IdempotencyKey) -> DispatchRecord {
        let started = Instant::now();
        let tries = self.retry.tries_per_provider();

        for (position, breaker) in self.breakers.iter().enumerate() {
            for try_index in 0..tries {
                let attempt = self.tracker.begin_attempt(&key).unwrap_or_default();

                match breaker.send(&payload).await {
                    Ok(receipt) => {
                        metrics::record_attempt(breaker.name(), "success");
                        let record = self.tracker.mark_sent(&key, &receipt.provider);
                        tracing::info!(
                            key = %key,
                            provider = %receipt.provider,
                            message_id = %receipt.message_id,
                            attempts = attempt,
                            "Dispatch sent"
                        );
                        metrics::record_dispatch("sent");
                        metrics::record_dispatch_duration(started);
                        // Delivered: never fall through to another provider.
                        return record.unwrap_or_else(|| {
                            self.receipt_record(&key, attempt, &receipt.provider)
                        });
                    }
                    Err(err) => {
                        metrics::record_attempt(
                            breaker.name(),
                            if err.is_rejection() { "rejected" } else { "failure" },
                        );
                        let delay = self.retry.delay_after(try_index);
                        tracing::warn!(
                            key = %key,
                            provider = %breaker.name(),
                            attempt,
                            try_index,
                            error = %err,
                            retry_in_ms = delay.map(|d| d.as_millis() as u64),
                            "Dispatch try failed"
                        );
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            if let Some(next) = self.breakers.get(position + 1) {
                tracing::info!(
                    key = %key,
                    exhausted = %breaker.name(),
                    next = %next.name(),
                    "Provider exhausted, falling back"
                );
            }
        }

        let record = self.tracker.mark_failed(&key);
        tracing::error!(key = %key, providers = self.breakers.len(), "All providers exhausted, dispatch failed");
        metrics::record_dispatch("failed");
        metrics::record_dispatch_duration(started);
        record.or_else(|| self.tracker.get(&key)).unwrap_or_else(|| DispatchRecord {
            state: DispatchState::Failed,
            ..DispatchRecord::pending(key.clone())
        })
    }

    /// Record for a delivery whose tracked entry could not be updated.
    fn receipt_record(&self, key: &IdempotencyKey, attempts: u32, provider: &str) -> DispatchRecord {
        self.tracker.get(key).unwrap_or_else(|| DispatchRecord {
            state: DispatchState::Sent,
            attempts,
            provider: Some(provider.to_string()),
            last_attempt_at: Some(unix_millis()),
            ..DispatchRecord::pending(key.clone())
        })
    }
}
