//! Admin API: read-only view of limiter occupancy.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::gateway::GatewayGuard;

#[derive(Clone)]
pub struct AdminState {
    pub guard: GatewayGuard,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(guard: GatewayGuard, api_key: &str) -> Self {
        Self {
            guard,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/limits", get(get_limits))
        .route("/admin/limits/{address}", get(get_address))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn state() -> AdminState {
        AdminState::new(GatewayGuard::new(RateLimitConfig::default()), "secret")
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let app = setup_admin_router(state());
        let res = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn limits_report_lists_open_addresses() {
        let state = state();
        let _a = state.guard.on_connect("10.0.0.1").unwrap();
        let _b = state.guard.on_connect("10.0.0.1").unwrap();
        let app = setup_admin_router(state);

        let res = app.oneshot(get("/admin/limits", Some("secret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["limits"]["max_commands"], 120);
        assert_eq!(report["addresses"][0]["address"], "10.0.0.1");
        assert_eq!(report["addresses"][0]["open_connections"], 2);
    }

    #[tokio::test]
    async fn address_lookup_reports_zero_for_unknown() {
        let app = setup_admin_router(state());
        let res = app
            .oneshot(get("/admin/limits/192.0.2.1", Some("secret")))
            .await
            .unwrap();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let usage: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(usage["open_connections"], 0);
    }
}
