//! Resilient email dispatch library.
//!
//! Sends through a prioritized list of providers, each behind its own circuit
//! breaker, with per-provider retries, exponential backoff, a global sliding
//! window rate limit and idempotent request handling.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod providers;
pub mod resilience;
pub mod security;

pub use config::MailgateConfig;
pub use dispatch::{DispatchEngine, DispatchRecord, DispatchState, EmailPayload, IdempotencyKey};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use providers::{ProviderPort, SimulatedProvider};
