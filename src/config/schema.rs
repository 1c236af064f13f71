//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, gateway path).
    pub listener: ListenerConfig,

    /// Per-connection command limits and per-address connection limits.
    pub rate_limit: RateLimitConfig,

    /// CORS allow-list for the HTTP surface.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Path the WebSocket gateway is served on.
    pub path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            path: "/gateway".to_string(),
        }
    }
}

/// Gateway rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Commands allowed per window before the connection is closed.
    pub max_commands: u64,

    /// Window duration in milliseconds.
    pub window_ms: u64,

    /// Concurrent connections allowed per source address.
    pub max_connections_per_ip: usize,

    /// Close connections that send commands without a registered window
    /// instead of letting them through.
    pub reject_untracked: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_commands: 120,
            window_ms: 60_000,
            max_connections_per_ip: 50,
            reject_untracked: false,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins granted CORS access. Empty reflects any origin.
    pub allowed_origins: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:3002".to_string(),
        }
    }
}
