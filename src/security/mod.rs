//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade:
//!     → cors.rs (response headers, preflight short-circuit)
//!     → rate_limit.rs admit (ip_accounting.rs per-address slots)
//!     → rate_limit.rs register (registry.rs per-connection window)
//!
//! Each command:
//!     → rate_limit.rs check_command → Allowed | RateLimited
//!
//! Close (voluntary or forced):
//!     → rate_limit.rs release (registry first, then address slot)
//! ```
//!
//! # Design Decisions
//! - One RateLimiter owns both maps; nothing else touches them
//! - Window expiry is evaluated lazily on the next command, no timers
//! - Teardown is idempotent so racing close paths are harmless

pub mod cors;
pub mod error;
pub mod ip_accounting;
pub mod rate_limit;
pub mod registry;

pub use error::GuardError;
pub use rate_limit::{CommandVerdict, LimiterStats, RateLimiter, UntrackedPolicy};
