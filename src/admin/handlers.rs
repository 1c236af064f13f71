use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::config::RateLimitConfig;
use crate::security::LimiterStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub limiter: LimiterStats,
}

#[derive(Serialize)]
pub struct AddressUsage {
    pub address: String,
    pub open_connections: usize,
}

#[derive(Serialize)]
pub struct LimitsReport {
    pub limits: RateLimitConfig,
    pub addresses: Vec<AddressUsage>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        limiter: state.guard.limiter().stats(),
    })
}

pub async fn get_limits(State(state): State<AdminState>) -> Json<LimitsReport> {
    let addresses = state
        .guard
        .limiter()
        .address_snapshot()
        .into_iter()
        .map(|(address, open_connections)| AddressUsage {
            address,
            open_connections,
        })
        .collect();

    Json(LimitsReport {
        limits: (*state.guard.limits()).clone(),
        addresses,
    })
}

pub async fn get_address(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> Json<AddressUsage> {
    let open_connections = state.guard.limiter().open_connections(&address);
    Json(AddressUsage {
        address,
        open_connections,
    })
}
