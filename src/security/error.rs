//! Error definitions for admission and command limiting.

use thiserror::Error;

use crate::net::ConnectionId;

/// Errors raised by the gateway limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Admission refused: the address already holds its quota of connections.
    #[error("too many connections from {address} (limit {limit})")]
    TooManyConnectionsForAddress { address: String, limit: usize },

    /// Command cap exceeded within the current window.
    #[error("connection {id} rate limited: {commands} commands in window (limit {limit})")]
    RateLimited {
        id: ConnectionId,
        commands: u64,
        limit: u64,
    },

    /// The same connection was registered twice. Always a lifecycle bug upstream.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

impl GuardError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GuardError::TooManyConnectionsForAddress { .. } => "too_many_connections",
            GuardError::RateLimited { .. } => "rate_limited",
            GuardError::AlreadyRegistered(_) => "already_registered",
        }
    }
}
