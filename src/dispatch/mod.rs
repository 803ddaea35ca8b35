//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch(payload, key)
//!     → idempotency.rs / status.rs (existing record? return it)
//!     → security::RateLimiter (window full? reject)
//!     → status.rs (create pending record)
//!     → engine.rs (retry/fallback across resilience::CircuitBreaker)
//!     → status.rs (sent or failed, terminal from then on)
//! ```

pub mod engine;
pub mod idempotency;
pub mod status;
pub mod types;

pub use engine::DispatchEngine;
pub use idempotency::IdempotencyGuard;
pub use status::{RecordHandle, Registration, StatusTracker};
pub use types::{
    DispatchError, DispatchRecord, DispatchState, EmailPayload, IdempotencyKey, InvalidKey,
};
