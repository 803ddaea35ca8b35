//! Simulated delivery backend.
//!
//! Stands in for a real email API: waits for a configured latency, then fails
//! with a configured probability.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::dispatch::EmailPayload;
use crate::providers::{ProviderError, ProviderPort, SendReceipt};

/// A failure-prone provider with tunable failure rate and latency.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    name: String,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedProvider {
    /// `failure_rate` is clamped to `[0, 1]`; NaN counts as always failing.
    pub fn new(name: impl Into<String>, failure_rate: f64, latency: Duration) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            1.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            name: name.into(),
            failure_rate,
            latency,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.failure_rate,
            Duration::from_millis(config.latency_ms),
        )
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl ProviderPort for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, email: &EmailPayload) -> Result<SendReceipt, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            tracing::debug!(provider = %self.name, to = %email.to, "Simulated send failure");
            return Err(ProviderError::new(&self.name, "simulated transport failure"));
        }

        let message_id = Uuid::new_v4().to_string();
        tracing::debug!(provider = %self.name, to = %email.to, message_id = %message_id, "Simulated send accepted");
        Ok(SendReceipt {
            provider: self.name.clone(),
            message_id,
        })
    }
}
