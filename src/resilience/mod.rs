//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch try against a provider:
//!     → circuit_breaker.rs (fail fast if open, single probe if half-open)
//!     → On failure: retries.rs (tries left for this provider?)
//!     → backoff.rs (wait base * 2^try before the next try)
//!     → Budget exhausted: fall back to the next provider
//!
//! Whole dispatch:
//!     → timeouts.rs (optional caller-side deadline, never cancels a try)
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit breaker (not global)
//! - Backoff is a suspending sleep, never a blocking one
//! - Backoff is deterministic: no jitter, no cap

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState, SendError};
pub use retries::RetryPolicy;
