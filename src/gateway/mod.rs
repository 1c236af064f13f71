//! Gateway connection subsystem.
//!
//! `lifecycle.rs` is transport-agnostic; `socket.rs` binds it to axum
//! WebSockets.

pub mod close_code;
pub mod lifecycle;
pub mod socket;

pub use close_code::CloseCode;
pub use lifecycle::{ConnectionLease, GatewayGuard, GatewaySocket};
pub use socket::{gateway_handler, CommandHandler, EchoHandler, GatewayState};
