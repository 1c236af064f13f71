//! Connection identity and lifecycle states.
//!
//! # Responsibilities
//! - Generate unique connection IDs for registry keys and tracing
//! - Pair each ID with the source address it was admitted under
//! - Name the states of an admitted connection (Active → Closed)

use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Address recorded when the transport cannot report a peer.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live connection as seen by the limiter: a stable ID plus the
/// source address its admission was charged against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity {
    id: ConnectionId,
    address: String,
}

impl ConnectionIdentity {
    /// Allocate a fresh identity for a connection from `address`.
    ///
    /// An empty address is recorded as [`UNKNOWN_ADDRESS`] so that all
    /// unattributable peers share one counter.
    pub fn new(address: impl Into<String>) -> Self {
        let mut address = address.into();
        if address.is_empty() {
            address = UNKNOWN_ADDRESS.to_string();
        }
        Self {
            id: ConnectionId::new(),
            address,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// State of an admitted connection. A connection that was never admitted
/// has no lease and therefore no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted and registered; commands are being counted.
    Active,
    /// Torn down (voluntarily or forced). Terminal.
    Closed,
}
