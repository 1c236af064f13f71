//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and windows > 0)
//! - Check addresses parse and the gateway path is absolute
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.path must start with '/': {0}")]
    InvalidPath(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let limits = &config.rate_limit;
    if limits.max_commands == 0 {
        errors.push(ValidationError::NotPositive { field: "rate_limit.max_commands" });
    }
    if limits.window_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "rate_limit.window_ms" });
    }
    if limits.max_connections_per_ip == 0 {
        errors.push(ValidationError::NotPositive { field: "rate_limit.max_connections_per_ip" });
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if !config.listener.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.listener.path.clone()));
    }

    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
