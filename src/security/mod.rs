//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming dispatch request:
//!     → limits.rs (validate payload shape and sizes, validate key)
//!     → dispatch engine idempotency check
//!     → rate_limit.rs (global sliding window, only for unseen keys)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any validation failure
//! - Validation happens at the boundary, before the engine sees a request
//! - No trust in client input

pub mod limits;
pub mod rate_limit;

pub use limits::{validate_payload, ValidationError};
pub use rate_limit::RateLimiter;
