//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, body limit)
//!     → request.rs (decode body, resolve idempotency key)
//!     → security::limits (validate payload)
//!     → dispatch::DispatchEngine
//!     → response.rs (map outcome to status code)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{SendEmailRequest, IDEMPOTENCY_KEY_HEADER, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
