//! Gateway rate limiter.
//!
//! Combines per-address admission ([`IpAccounting`]) with per-connection
//! command windows ([`ConnectionRegistry`]). Callers depend only on the
//! operations here; the two maps are never exposed.
//!
//! # Lifecycle
//! ```text
//! connect    → admit(address) → register(id)         → Active
//! command    → check_command(id, now)                Active (or → Closed on RateLimited)
//! disconnect → release(identity)                     → Closed
//! ```

use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::net::{ConnectionId, ConnectionIdentity};
use crate::security::error::GuardError;
use crate::security::ip_accounting::IpAccounting;
use crate::security::registry::ConnectionRegistry;

/// Outcome of a single command check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerdict {
    Allowed,
    /// The connection exceeded its window and must be closed.
    RateLimited { commands: u64 },
}

impl CommandVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CommandVerdict::Allowed)
    }

    /// Convert a rejection into [`GuardError::RateLimited`] for callers
    /// that propagate with `?`.
    pub fn into_result(self, id: ConnectionId, limit: u64) -> Result<(), GuardError> {
        match self {
            CommandVerdict::Allowed => Ok(()),
            CommandVerdict::RateLimited { commands } => Err(GuardError::RateLimited {
                id,
                commands,
                limit,
            }),
        }
    }
}

/// What to do when a command arrives for a connection with no window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UntrackedPolicy {
    /// Fail open: let the command through.
    #[default]
    Allow,
    /// Fail closed: treat the command as rate limited.
    Reject,
}

impl From<&RateLimitConfig> for UntrackedPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        if config.reject_untracked {
            UntrackedPolicy::Reject
        } else {
            UntrackedPolicy::Allow
        }
    }
}

/// Point-in-time view of limiter occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub active_connections: usize,
    pub tracked_addresses: usize,
}

/// Owner of all limiter state for one process.
#[derive(Debug, Default)]
pub struct RateLimiter {
    ips: IpAccounting,
    registry: ConnectionRegistry,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            ips: IpAccounting::new(),
            registry: ConnectionRegistry::new(),
        }
    }

    /// Admission check for a new connection from `address`.
    ///
    /// On success one slot is held for `address` until [`release`](Self::release).
    /// On failure nothing is recorded and no release is owed.
    pub fn admit(&self, address: &str, config: &RateLimitConfig) -> Result<(), GuardError> {
        if self.ips.try_acquire(address, config.max_connections_per_ip) {
            Ok(())
        } else {
            Err(GuardError::TooManyConnectionsForAddress {
                address: address.to_string(),
                limit: config.max_connections_per_ip,
            })
        }
    }

    /// Start the command window for an admitted connection.
    pub fn register(&self, id: ConnectionId, now: u64) -> Result<(), GuardError> {
        self.registry.register(id, now).map(|_| ())
    }

    /// Admit and register in one step.
    ///
    /// If registration fails the address slot taken by admission is handed
    /// back before the error is returned.
    pub fn open(
        &self,
        identity: &ConnectionIdentity,
        now: u64,
        config: &RateLimitConfig,
    ) -> Result<(), GuardError> {
        self.admit(identity.address(), config)?;
        if let Err(e) = self.register(identity.id(), now) {
            self.ips.release(identity.address());
            return Err(e);
        }
        tracing::trace!(
            connection_id = %identity.id(),
            address = %identity.address(),
            open = self.ips.open_count(identity.address()),
            "Connection registered"
        );
        Ok(())
    }

    /// Count one command for `id` at `now`.
    pub fn check_command(
        &self,
        id: ConnectionId,
        now: u64,
        config: &RateLimitConfig,
    ) -> CommandVerdict {
        match self.registry.record(id, now, config.window_ms) {
            Some(commands) if commands > config.max_commands => {
                CommandVerdict::RateLimited { commands }
            }
            Some(_) => CommandVerdict::Allowed,
            None => match UntrackedPolicy::from(config) {
                UntrackedPolicy::Allow => {
                    tracing::debug!(connection_id = %id, "Command from untracked connection allowed");
                    CommandVerdict::Allowed
                }
                UntrackedPolicy::Reject => {
                    tracing::debug!(connection_id = %id, "Command from untracked connection rejected");
                    CommandVerdict::RateLimited { commands: 0 }
                }
            },
        }
    }

    /// Tear down all state for a connection.
    ///
    /// The address slot is returned only if this call removed the
    /// connection's window, so repeated calls have the effect of one.
    /// Returns whether anything was released.
    pub fn release(&self, identity: &ConnectionIdentity) -> bool {
        if self.registry.unregister(identity.id()) {
            self.ips.release(identity.address());
            tracing::trace!(
                connection_id = %identity.id(),
                address = %identity.address(),
                "Connection released"
            );
            true
        } else {
            false
        }
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.registry.lookup(id).is_some()
    }

    pub fn open_connections(&self, address: &str) -> usize {
        self.ips.open_count(address)
    }

    /// Addresses with open connections, busiest first.
    pub fn address_snapshot(&self) -> Vec<(String, usize)> {
        self.ips.snapshot()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            active_connections: self.registry.len(),
            tracked_addresses: self.ips.tracked_addresses(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_commands: u64, window_ms: u64, max_connections_per_ip: usize) -> RateLimitConfig {
        RateLimitConfig {
            max_commands,
            window_ms,
            max_connections_per_ip,
            reject_untracked: false,
        }
    }

    #[test]
    fn allows_exactly_max_commands_per_window() {
        let limiter = RateLimiter::new();
        let cfg = config(5, 1000, 10);
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &cfg).unwrap();

        for t in 0..5 {
            assert_eq!(limiter.check_command(conn.id(), t, &cfg), CommandVerdict::Allowed);
        }
        assert_eq!(
            limiter.check_command(conn.id(), 5, &cfg),
            CommandVerdict::RateLimited { commands: 6 }
        );
    }

    #[test]
    fn rejected_verdict_converts_to_rate_limited_error() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 1000, 10);
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &cfg).unwrap();

        let first = limiter.check_command(conn.id(), 0, &cfg);
        assert_eq!(first.into_result(conn.id(), cfg.max_commands), Ok(()));

        let err = limiter
            .check_command(conn.id(), 1, &cfg)
            .into_result(conn.id(), cfg.max_commands)
            .unwrap_err();
        assert_eq!(
            err,
            GuardError::RateLimited {
                id: conn.id(),
                commands: 2,
                limit: 1,
            }
        );
        assert_eq!(err.reason(), "rate_limited");
    }

    #[test]
    fn boundary_command_counts_against_new_window() {
        let limiter = RateLimiter::new();
        let cfg = config(120, 1000, 10);
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &cfg).unwrap();

        assert!(limiter.check_command(conn.id(), 0, &cfg).is_allowed());
        assert!(limiter.check_command(conn.id(), 1000, &cfg).is_allowed());
        assert_eq!(limiter.registry.lookup(conn.id()).unwrap().command_count, 1);
    }

    #[test]
    fn reset_clears_exhausted_window() {
        let limiter = RateLimiter::new();
        let cfg = config(2, 1000, 10);
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &cfg).unwrap();

        limiter.check_command(conn.id(), 0, &cfg);
        limiter.check_command(conn.id(), 1, &cfg);
        assert!(!limiter.check_command(conn.id(), 2, &cfg).is_allowed());
        assert!(limiter.check_command(conn.id(), 1002, &cfg).is_allowed());
    }

    #[test]
    fn config_may_change_between_checks() {
        let limiter = RateLimiter::new();
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &config(10, 1000, 10)).unwrap();

        assert!(limiter.check_command(conn.id(), 0, &config(10, 1000, 10)).is_allowed());
        assert!(limiter.check_command(conn.id(), 1, &config(10, 1000, 10)).is_allowed());
        assert!(!limiter.check_command(conn.id(), 2, &config(2, 1000, 10)).is_allowed());
    }

    #[test]
    fn untracked_connection_fails_open_by_default() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 1000, 10);
        let stray = ConnectionId::new();
        for t in 0..10 {
            assert!(limiter.check_command(stray, t, &cfg).is_allowed());
        }
        assert_eq!(limiter.stats().active_connections, 0);
    }

    #[test]
    fn untracked_connection_rejected_when_strict() {
        let limiter = RateLimiter::new();
        let mut cfg = config(1, 1000, 10);
        cfg.reject_untracked = true;
        assert_eq!(
            limiter.check_command(ConnectionId::new(), 0, &cfg),
            CommandVerdict::RateLimited { commands: 0 }
        );
    }

    #[test]
    fn admission_limit_and_reopen_after_release() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 1000, 2);
        let c1 = ConnectionIdentity::new("a");
        let c2 = ConnectionIdentity::new("a");
        let c3 = ConnectionIdentity::new("a");

        limiter.open(&c1, 0, &cfg).unwrap();
        limiter.open(&c2, 0, &cfg).unwrap();
        let err = limiter.open(&c3, 0, &cfg).unwrap_err();
        assert_eq!(
            err,
            GuardError::TooManyConnectionsForAddress { address: "a".into(), limit: 2 }
        );
        assert!(!limiter.is_registered(c3.id()));

        limiter.release(&c1);
        limiter.open(&c3, 0, &cfg).unwrap();
        assert_eq!(limiter.open_connections("a"), 2);
    }

    #[test]
    fn double_release_has_single_effect() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 1000, 5);
        let c1 = ConnectionIdentity::new("a");
        let c2 = ConnectionIdentity::new("a");
        limiter.open(&c1, 0, &cfg).unwrap();
        limiter.open(&c2, 0, &cfg).unwrap();

        assert!(limiter.release(&c1));
        assert!(!limiter.release(&c1));
        assert_eq!(limiter.open_connections("a"), 1);
        assert!(limiter.is_registered(c2.id()));
    }

    #[test]
    fn no_residual_entries_after_all_released() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 1000, 5);
        let conns: Vec<_> = (0..5).map(|_| ConnectionIdentity::new("a")).collect();
        for c in &conns {
            limiter.open(c, 0, &cfg).unwrap();
        }
        for c in &conns {
            limiter.release(c);
        }
        assert_eq!(
            limiter.stats(),
            LimiterStats { active_connections: 0, tracked_addresses: 0 }
        );
        assert!(limiter.address_snapshot().is_empty());
    }

    #[test]
    fn failed_registration_returns_address_slot() {
        let limiter = RateLimiter::new();
        let cfg = config(10, 1000, 5);
        let conn = ConnectionIdentity::new("a");
        limiter.open(&conn, 0, &cfg).unwrap();

        let err = limiter.open(&conn, 0, &cfg).unwrap_err();
        assert_eq!(err, GuardError::AlreadyRegistered(conn.id()));
        assert_eq!(limiter.open_connections("a"), 1);
    }

    #[test]
    fn concurrent_open_release_churn_leaves_no_state() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new());
        let cfg = config(1000, 1000, 3);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let cfg = cfg.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let conn = ConnectionIdentity::new("shared");
                        if limiter.open(&conn, 0, &cfg).is_ok() {
                            assert!(limiter.open_connections("shared") <= 3);
                            limiter.check_command(conn.id(), 1, &cfg);
                            limiter.release(&conn);
                            limiter.release(&conn);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(
            limiter.stats(),
            LimiterStats { active_connections: 0, tracked_addresses: 0 }
        );
    }

    #[test]
    fn reference_scenario() {
        let limiter = RateLimiter::new();
        let cfg = config(2, 1000, 1);
        let c1 = ConnectionIdentity::new("A");
        let c2 = ConnectionIdentity::new("A");

        limiter.open(&c1, 0, &cfg).unwrap();
        assert!(limiter.open(&c2, 0, &cfg).is_err());

        assert!(limiter.check_command(c1.id(), 0, &cfg).is_allowed());
        assert!(limiter.check_command(c1.id(), 10, &cfg).is_allowed());
        assert!(!limiter.check_command(c1.id(), 20, &cfg).is_allowed());

        limiter.release(&c1);
        limiter.open(&c2, 30, &cfg).unwrap();
    }
}
