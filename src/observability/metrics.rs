//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mailgate_dispatch_total` (counter): dispatch outcomes by `outcome`
//!   (sent, failed, duplicate)
//! - `mailgate_provider_attempts_total` (counter): tries by `provider`, `result`
//!   (success, failure, rejected)
//! - `mailgate_rate_limited_total` (counter): requests turned away by the limiter
//! - `mailgate_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `mailgate_dispatch_duration_seconds` (histogram): admitted dispatch latency
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels stay low-cardinality: never the recipient or idempotency key

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter, serving scrapes on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("mailgate_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_attempt(provider: &str, result: &'static str) {
    metrics::counter!(
        "mailgate_provider_attempts_total",
        "provider" => provider.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("mailgate_rate_limited_total").increment(1);
}

pub fn record_circuit_state(provider: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("mailgate_circuit_state", "provider" => provider.to_string()).set(value);
}

pub fn record_dispatch_duration(started: Instant) {
    metrics::histogram!("mailgate_dispatch_duration_seconds").record(started.elapsed().as_secs_f64());
}
