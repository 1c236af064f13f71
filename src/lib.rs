//! Gateway connection guard library.
//!
//! Bounds how many commands a gateway connection may send per window and how
//! many connections one source address may hold open.

pub mod admin;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use gateway::{CloseCode, GatewayGuard};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use security::{CommandVerdict, GuardError, RateLimiter};
