//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connections_admitted_total` (counter)
//! - `gateway_connections_rejected_total` (counter): by reason
//! - `gateway_commands_total` (counter): by verdict
//! - `gateway_active_connections` (gauge)
//! - `gateway_tracked_addresses` (gauge)

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::LimiterStats;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

pub fn record_admitted() {
    counter!("gateway_connections_admitted_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("gateway_connections_rejected_total", "reason" => reason).increment(1);
}

pub fn record_command(allowed: bool) {
    let verdict = if allowed { "allowed" } else { "rate_limited" };
    counter!("gateway_commands_total", "verdict" => verdict).increment(1);
}

/// Publish limiter occupancy.
pub fn record_occupancy(stats: LimiterStats) {
    gauge!("gateway_active_connections").set(stats.active_connections as f64);
    gauge!("gateway_tracked_addresses").set(stats.tracked_addresses as f64);
}
