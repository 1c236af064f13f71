//! Registry of per-connection rate windows.
//!
//! Each live connection owns exactly one [`RateWindow`], created when the
//! connection is registered and dropped when it is unregistered. Entries are
//! keyed by [`ConnectionId`] so state never outlives the connection.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::net::ConnectionId;
use crate::security::error::GuardError;

/// Rolling command count for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub command_count: u64,
    pub window_start: u64,
}

impl RateWindow {
    pub fn new(now: u64) -> Self {
        Self {
            command_count: 0,
            window_start: now,
        }
    }

    /// Count one command at `now` and return the count for the current window.
    ///
    /// A command landing on or after `window_start + window_ms` starts a new
    /// window and is counted as its first command.
    pub fn record(&mut self, now: u64, window_ms: u64) -> u64 {
        if now.saturating_sub(self.window_start) >= window_ms {
            self.command_count = 0;
            self.window_start = now;
        }
        self.command_count += 1;
        self.command_count
    }
}

/// Owner of every live connection's [`RateWindow`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    windows: DashMap<ConnectionId, RateWindow>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Create a fresh window for `id` starting at `now`.
    pub fn register(&self, id: ConnectionId, now: u64) -> Result<RateWindow, GuardError> {
        match self.windows.entry(id) {
            Entry::Occupied(_) => Err(GuardError::AlreadyRegistered(id)),
            Entry::Vacant(entry) => {
                let window = RateWindow::new(now);
                entry.insert(window);
                Ok(window)
            }
        }
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<RateWindow> {
        self.windows.get(&id).map(|w| *w.value())
    }

    /// Record a command for `id`. Returns `None` if `id` is not registered.
    pub fn record(&self, id: ConnectionId, now: u64, window_ms: u64) -> Option<u64> {
        self.windows
            .get_mut(&id)
            .map(|mut window| window.record(now, window_ms))
    }

    /// Remove the window for `id`. Returns whether an entry was present.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.windows.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
