//! Delivery provider subsystem.
//!
//! # Data Flow
//! ```text
//! [[providers]] config entries (declaration order = priority)
//!     → build_providers() constructs one backend per entry
//!     → each wrapped by its own CircuitBreaker in the dispatch engine
//!     → engine calls send() through the breaker
//! ```
//!
//! # Design Decisions
//! - Providers are opaque: a name plus a fallible send, nothing else
//! - Engine and breaker are polymorphic over `ProviderPort`, never over
//!   concrete backend types
//! - Failures are returned as values, never panics

pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::dispatch::EmailPayload;

pub use simulated::SimulatedProvider;

/// Successful hand-off of a message to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Name of the provider that accepted the message.
    pub provider: String,
    /// Provider-assigned message identifier.
    pub message_id: String,
}

/// A provider failed to accept a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider {provider} failed to send: {reason}")]
pub struct ProviderError {
    pub provider: String,
    pub reason: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Capability every delivery backend must provide.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    /// Stable provider name, used in records, logs and metrics.
    fn name(&self) -> &str;

    /// Attempt to deliver `email`.
    async fn send(&self, email: &EmailPayload) -> Result<SendReceipt, ProviderError>;
}

/// Build the configured providers in priority order.
pub fn build_providers(configs: &[ProviderConfig]) -> Vec<Arc<dyn ProviderPort>> {
    configs
        .iter()
        .map(|config| Arc::new(SimulatedProvider::from_config(config)) as Arc<dyn ProviderPort>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_providers_keeps_order() {
        let configs = vec![
            ProviderConfig {
                name: "primary".into(),
                failure_rate: 0.0,
                latency_ms: 0,
            },
            ProviderConfig {
                name: "fallback".into(),
                failure_rate: 1.0,
                latency_ms: 0,
            },
        ];
        let providers = build_providers(&configs);
        let names: Vec<_> = providers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["primary", "fallback"]);
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::new("provider-a", "connection reset");
        assert_eq!(
            err.to_string(),
            "provider provider-a failed to send: connection reset"
        );
    }
}
