//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MailgateConfig (validated, immutable)
//!     → read once at startup by each subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, ListenerConfig, MailgateConfig, ObservabilityConfig, ProviderConfig,
    RateLimitConfig, RetryConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
