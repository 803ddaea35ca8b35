//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, sends pass through
//! - Open: provider assumed down, sends fail fast
//! - Half-Open: one probe send tests whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: next send after reset timeout (lazy, no timer)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per provider, never shared
//! - Fail fast in Open state: the provider is not invoked
//! - Single probe in Half-Open; concurrent sends fail with `ProbeInProgress`
//! - The lock is never held across the provider call

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::dispatch::EmailPayload;
use crate::observability::metrics;
use crate::providers::{ProviderError, ProviderPort, SendReceipt};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Why a send through the breaker failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The circuit is open; the provider was not invoked.
    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    /// A half-open probe is already running; the provider was not invoked.
    #[error("half-open probe already in flight for provider {0}")]
    ProbeInProgress(String),

    /// The provider was invoked and failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl SendError {
    /// True when the breaker rejected the call without reaching the provider.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SendError::CircuitOpen(_) | SendError::ProbeInProgress(_))
    }
}

/// Point-in-time view of a breaker, for status endpoints and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct CircuitData {
    state: CircuitState,
    /// Consecutive failures while closed.
    failure_count: u32,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
}

impl CircuitData {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            probe_in_flight: false,
        }
    }
}

/// Wraps one provider and gates calls to it.
pub struct CircuitBreaker {
    provider: Arc<dyn ProviderPort>,
    failure_threshold: u32,
    reset_timeout: Duration,
    data: Mutex<CircuitData>,
}

impl CircuitBreaker {
    pub fn new(provider: Arc<dyn ProviderPort>, config: &CircuitBreakerConfig) -> Self {
        Self {
            provider,
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
            data: Mutex::new(CircuitData::new()),
        }
    }

    /// Name of the wrapped provider.
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn state(&self) -> CircuitState {
        self.data.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.data.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let data = self.data.lock();
        CircuitSnapshot {
            provider: self.name().to_string(),
            state: data.state,
            failure_count: data.failure_count,
            probe_in_flight: data.probe_in_flight,
        }
    }

    /// Send through the breaker. Same contract as `ProviderPort::send`, plus
    /// the two rejection errors.
    pub async fn send(&self, email: &EmailPayload) -> Result<SendReceipt, SendError> {
        let mut permit = self.admit()?;
        let result = self.provider.send(email).await;
        self.record(permit.is_probe, result.is_ok());
        permit.complete();
        result.map_err(SendError::from)
    }

    /// Gate a call. Performs the lazy Open → Half-Open transition.
    fn admit(&self) -> Result<Permit<'_>, SendError> {
        let mut data = self.data.lock();
        let state = data.state;
        match state {
            CircuitState::Closed => Ok(Permit::regular(&self.data)),
            CircuitState::Open => {
                let expired = data
                    .last_failure_at
                    .map_or(true, |at| at.elapsed() > self.reset_timeout);
                if !expired {
                    return Err(SendError::CircuitOpen(self.name().to_string()));
                }
                data.state = CircuitState::HalfOpen;
                data.probe_in_flight = true;
                drop(data);
                tracing::info!(provider = %self.name(), "Circuit breaker HALF-OPEN - probing provider");
                metrics::record_circuit_state(self.name(), CircuitState::HalfOpen);
                Ok(Permit::probe(&self.data))
            }
            CircuitState::HalfOpen => {
                if data.probe_in_flight {
                    return Err(SendError::ProbeInProgress(self.name().to_string()));
                }
                // A previous probe was abandoned before completing.
                data.probe_in_flight = true;
                Ok(Permit::probe(&self.data))
            }
        }
    }

    /// Apply the outcome of an admitted call.
    fn record(&self, is_probe: bool, success: bool) {
        let mut data = self.data.lock();
        let transition = match (data.state, success) {
            (CircuitState::Closed, true) => {
                data.failure_count = 0;
                None
            }
            (CircuitState::Closed, false) => {
                data.failure_count += 1;
                data.last_failure_at = Some(Instant::now());
                if data.failure_count >= self.failure_threshold {
                    data.state = CircuitState::Open;
                    Some(CircuitState::Open)
                } else {
                    None
                }
            }
            (CircuitState::HalfOpen, true) if is_probe => {
                data.state = CircuitState::Closed;
                data.failure_count = 0;
                data.last_failure_at = None;
                data.probe_in_flight = false;
                Some(CircuitState::Closed)
            }
            (CircuitState::HalfOpen, false) if is_probe => {
                data.state = CircuitState::Open;
                data.last_failure_at = Some(Instant::now());
                data.probe_in_flight = false;
                Some(CircuitState::Open)
            }
            // Result of a call admitted before the breaker opened.
            _ => None,
        };
        let failure_count = data.failure_count;
        drop(data);

        match transition {
            Some(CircuitState::Open) if is_probe => {
                tracing::warn!(provider = %self.name(), "Circuit breaker probe failed - reopening circuit");
            }
            Some(CircuitState::Open) => {
                tracing::warn!(
                    provider = %self.name(),
                    failure_count,
                    threshold = self.failure_threshold,
                    reset_timeout_secs = self.reset_timeout.as_secs(),
                    "Circuit breaker OPENED - rejecting sends"
                );
            }
            Some(CircuitState::Closed) => {
                tracing::info!(provider = %self.name(), "Circuit breaker CLOSED - normal operation resumed");
            }
            _ => {}
        }
        if let Some(state) = transition {
            metrics::record_circuit_state(self.name(), state);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("provider", &self.name())
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("data", &*self.data.lock())
            .finish()
    }
}

/// RAII permit for an admitted call.
///
/// If a probe is dropped before its outcome is recorded (the caller's future
/// was cancelled), the probe flag is released so the breaker can probe again.
struct Permit<'a> {
    data: &'a Mutex<CircuitData>,
    is_probe: bool,
    pending: bool,
}

impl<'a> Permit<'a> {
    fn regular(data: &'a Mutex<CircuitData>) -> Self {
        Self {
            data,
            is_probe: false,
            pending: false,
        }
    }

    fn probe(data: &'a Mutex<CircuitData>) -> Self {
        Self {
            data,
            is_probe: true,
            pending: true,
        }
    }

    fn complete(&mut self) {
        self.pending = false;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.pending {
            let mut data = self.data.lock();
            if data.state == CircuitState::HalfOpen {
                data.probe_in_flight = false;
            }
        }
    }
}
