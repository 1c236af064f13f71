//! Connection lifecycle glue between the transport and the rate limiter.
//!
//! # Responsibilities
//! - Admit and register a connection on connect, refusing over-limit addresses
//! - Check every command and force-close with [`CloseCode::RATE_LIMITED`]
//! - Route both voluntary and forced closes through one teardown path
//!
//! # Design Decisions
//! - A [`ConnectionLease`] is the only handle to an admitted connection;
//!   release runs at most once, and on drop if nobody called it
//! - Limits are read from an `ArcSwap` per call so reloads apply to live
//!   connections without touching their windows

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::clock::{Clock, MonotonicClock};
use crate::config::RateLimitConfig;
use crate::gateway::close_code::CloseCode;
use crate::net::{ConnectionIdentity, ConnectionState};
use crate::observability::metrics;
use crate::security::{CommandVerdict, GuardError, RateLimiter};

/// The transport capability the adapter needs: closing with a code.
pub trait GatewaySocket {
    fn close(&mut self, code: CloseCode) -> impl Future<Output = ()> + Send;
}

/// An admitted connection's hold on limiter state.
#[derive(Debug)]
pub struct ConnectionLease {
    identity: ConnectionIdentity,
    limiter: Arc<RateLimiter>,
    released: AtomicBool,
}

impl ConnectionLease {
    fn new(identity: ConnectionIdentity, limiter: Arc<RateLimiter>) -> Self {
        Self {
            identity,
            limiter,
            released: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        if self.released.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Active
        }
    }

    /// Release the connection's window and address slot.
    /// Returns true only for the call that actually released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.limiter.release(&self.identity)
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.release() {
            tracing::trace!(connection = %self.identity, "Lease released on drop");
            metrics::record_occupancy(self.limiter.stats());
        }
    }
}

/// Lifecycle adapter: the one entry point transports call into.
#[derive(Clone)]
pub struct GatewayGuard {
    limiter: Arc<RateLimiter>,
    limits: Arc<ArcSwap<RateLimitConfig>>,
    clock: Arc<dyn Clock>,
}

impl GatewayGuard {
    pub fn new(limits: RateLimitConfig) -> Self {
        Self::with_clock(limits, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(limits: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new()),
            limits: Arc::new(ArcSwap::from_pointee(limits)),
            clock,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Current limits.
    pub fn limits(&self) -> Arc<RateLimitConfig> {
        self.limits.load_full()
    }

    /// Swap in new limits; the next check on every connection uses them.
    pub fn update_limits(&self, limits: RateLimitConfig) {
        tracing::info!(
            max_commands = limits.max_commands,
            window_ms = limits.window_ms,
            max_connections_per_ip = limits.max_connections_per_ip,
            "Rate limits updated"
        );
        self.limits.store(Arc::new(limits));
    }

    /// Connect event. On error the handshake must be refused; nothing is owed.
    pub fn on_connect(&self, address: &str) -> Result<ConnectionLease, GuardError> {
        let identity = ConnectionIdentity::new(address);
        let limits = self.limits.load();

        match self.limiter.open(&identity, self.clock.now_ms(), &limits) {
            Ok(()) => {
                metrics::record_admitted();
                metrics::record_occupancy(self.limiter.stats());
                tracing::debug!(
                    connection = %identity,
                    open = self.limiter.open_connections(identity.address()),
                    "Connection admitted"
                );
                Ok(ConnectionLease::new(identity, self.limiter.clone()))
            }
            Err(e) => {
                match &e {
                    GuardError::AlreadyRegistered(id) => {
                        tracing::error!(connection_id = %id, "Connection registered twice");
                    }
                    _ => {
                        tracing::warn!(
                            address = %identity.address(),
                            limit = limits.max_connections_per_ip,
                            "Connection rejected: too many connections from address"
                        );
                    }
                }
                metrics::record_rejected(e.reason());
                Err(e)
            }
        }
    }

    /// Count a command without acting on the verdict.
    pub fn check(&self, lease: &ConnectionLease) -> CommandVerdict {
        let limits = self.limits.load();
        let verdict = self
            .limiter
            .check_command(lease.identity().id(), self.clock.now_ms(), &limits);
        metrics::record_command(verdict.is_allowed());

        if let Err(e) = verdict.into_result(lease.identity().id(), limits.max_commands) {
            tracing::warn!(
                connection = %lease.identity(),
                reason = e.reason(),
                error = %e,
                "Rate limited connection"
            );
        }
        verdict
    }

    /// Command event. A rate-limited connection is released first, then
    /// closed with [`CloseCode::RATE_LIMITED`]. The release never waits on
    /// the close frame reaching the peer.
    pub async fn on_command<S: GatewaySocket>(
        &self,
        lease: &ConnectionLease,
        socket: &mut S,
    ) -> CommandVerdict {
        let verdict = self.check(lease);
        if !verdict.is_allowed() {
            self.on_disconnect(lease);
            socket.close(CloseCode::RATE_LIMITED).await;
        }
        verdict
    }

    /// Disconnect event, voluntary or forced. Safe to call repeatedly.
    pub fn on_disconnect(&self, lease: &ConnectionLease) {
        if lease.release() {
            metrics::record_occupancy(self.limiter.stats());
            tracing::debug!(connection = %lease.identity(), "Connection closed");
        }
    }
}

impl std::fmt::Debug for GatewayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayGuard")
            .field("limits", &self.limits.load_full())
            .field("stats", &self.limiter.stats())
            .finish()
    }
}
