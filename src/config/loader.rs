//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::MailgateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MailgateConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MailgateConfig, ConfigError> {
    let config: MailgateConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.retries.backoff_base_ms, 200);
        assert_eq!(config.circuit_breaker.reset_timeout_secs, 30);
        assert!(config.providers.is_empty());
        assert_eq!(config.effective_providers().len(), 2);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            [retries]
            max_retries = 0

            [[providers]]
            name = "primary"
            failure_rate = 0.25

            [[providers]]
            name = "backup"
            latency_ms = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.retries.max_retries, 0);
        assert_eq!(config.retries.backoff_base_ms, 200);
        assert_eq!(config.providers[0].failure_rate, 0.25);
        assert_eq!(config.providers[1].failure_rate, 0.0);
        assert_eq!(config.providers[1].latency_ms, 40);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = parse_config("[rate_limit]\nwindow_secs = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(parse_config("[retries"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("mailgate.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].latency_ms, 80);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
