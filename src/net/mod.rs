//! Network-facing identity types.
//!
//! # Data Flow
//! ```text
//! Incoming WebSocket upgrade (peer SocketAddr)
//!     → connection.rs (ConnectionIdentity: id + source address)
//!     → security::RateLimiter (admission, command checks, release)
//!
//! Connection States:
//!     (refused: no lease) | Active → Closed
//! ```

pub mod connection;

pub use connection::{ConnectionId, ConnectionIdentity, ConnectionState, UNKNOWN_ADDRESS};
