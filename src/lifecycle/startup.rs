//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build providers and the dispatch engine
//! - Start the metrics exporter when enabled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use crate::config::{load_config, ConfigError, MailgateConfig};
use crate::dispatch::DispatchEngine;
use crate::observability::metrics;
use crate::providers::build_providers;

/// Load config from `path`, or use defaults when no path is given.
pub fn resolve_config(path: Option<&Path>) -> Result<MailgateConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(MailgateConfig::default()),
    }
}

/// Build the dispatch engine over the configured providers.
pub fn build_engine(config: &MailgateConfig) -> DispatchEngine {
    let providers = build_providers(&config.effective_providers());
    for provider in &providers {
        tracing::info!(provider = %provider.name(), "Provider registered");
    }
    DispatchEngine::new(providers, config)
}

/// Start the Prometheus exporter if enabled.
pub fn start_metrics(config: &MailgateConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_defaults_without_path() {
        let config = resolve_config(None).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_engine_uses_default_providers() {
        let engine = build_engine(&MailgateConfig::default());
        let names: Vec<_> = engine.providers().into_iter().map(|s| s.provider).collect();
        assert_eq!(names, vec!["provider-a", "provider-b"]);
    }

    #[test]
    fn test_engine_uses_configured_providers() {
        let config = MailgateConfig {
            providers: vec![ProviderConfig::new("only", 0.0)],
            ..Default::default()
        };
        assert_eq!(build_engine(&config).providers().len(), 1);
    }
}
