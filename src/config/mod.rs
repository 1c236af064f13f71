//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the live RateLimitConfig (ArcSwap)
//!     → next command check sees the new limits
//! ```
//!
//! # Design Decisions
//! - A RateLimitConfig is immutable for the duration of one check
//! - All fields have defaults to allow minimal configs
//! - Invalid reloads are dropped; the running limits stay in force

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AdminConfig, CorsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
