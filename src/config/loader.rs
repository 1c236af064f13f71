//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:4000"
            path = "/ws"

            [rate_limit]
            max_commands = 2
            window_ms = 1000
            max_connections_per_ip = 1

            [cors]
            allowed_origins = ["https://client.example"]
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.path, "/ws");
        assert_eq!(config.rate_limit.max_connections_per_ip, 1);
        assert_eq!(config.cors.allowed_origins, vec!["https://client.example".to_string()]);
    }

    #[test]
    fn validation_errors_are_reported() {
        let err = parse_config("[rate_limit]\nwindow_ms = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse_config("[rate_limit"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
