//! Millisecond time sources for window accounting.
//!
//! Windows are compared with plain `u64` millisecond stamps so the limiter
//! never touches the system clock itself; callers pass `now` in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of the `now` value handed to the limiter.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin. Must not go backwards.
    fn now_ms(&self) -> u64;
}

/// Monotonic clock measured from its own construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
