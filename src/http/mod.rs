//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → security::cors (headers, OPTIONS → 204)
//!     → /gateway → gateway::socket (admission, upgrade, command loop)
//!     → /health  → static status
//! ```

pub mod server;

pub use server::GatewayServer;
