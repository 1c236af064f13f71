//! CORS and security response headers.
//!
//! # Responsibilities
//! - Echo allowed origins (or any origin when no allow-list is configured)
//! - Echo requested headers/methods, falling back to `*`
//! - Attach a fixed max-age and restrictive Content-Security-Policy
//! - Answer `OPTIONS` preflights with an empty 204 before routing

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
            CONTENT_SECURITY_POLICY, ORIGIN,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

/// Preflight cache lifetime in seconds.
pub const MAX_AGE: &str = "86400";

/// Policy applied to every response.
pub const CSP: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data: blob:; connect-src 'self' wss:; font-src 'self'; frame-ancestors 'none'";

/// Origin allow-list. Empty means every origin is reflected.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(config.allowed_origins.clone())
    }

    /// Write CORS and CSP headers for a request carrying `request` headers.
    pub fn decorate(&self, request: &HeaderMap, response: &mut HeaderMap) {
        let origin = request.get(ORIGIN);

        if self.allowed_origins.is_empty() {
            let value = origin
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("*"));
            response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            response.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        } else if let Some(origin) = origin.filter(|o| self.is_allowed(o)) {
            response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            response.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        // Origins outside the allow-list get no CORS grant; the browser blocks them.

        response.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            echo_or_wildcard(request.get(ACCESS_CONTROL_REQUEST_HEADERS)),
        );
        response.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            echo_or_wildcard(request.get(ACCESS_CONTROL_REQUEST_METHOD)),
        );
        response.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
        response.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP));
    }

    fn is_allowed(&self, origin: &HeaderValue) -> bool {
        origin
            .to_str()
            .map(|o| self.allowed_origins.iter().any(|allowed| allowed == o))
            .unwrap_or(false)
    }
}

fn echo_or_wildcard(value: Option<&HeaderValue>) -> HeaderValue {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"))
}

/// Middleware applying [`CorsPolicy`] and short-circuiting preflights.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_headers = request.headers().clone();

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    policy.decorate(&request_headers, response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn empty_allow_list_reflects_origin() {
        let policy = CorsPolicy::default();
        let mut out = HeaderMap::new();
        policy.decorate(&headers(&[("origin", "https://app.example")]), &mut out);
        assert_eq!(out[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(out[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn empty_allow_list_without_origin_uses_wildcard() {
        let policy = CorsPolicy::default();
        let mut out = HeaderMap::new();
        policy.decorate(&HeaderMap::new(), &mut out);
        assert_eq!(out[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn allow_list_grants_only_listed_origins() {
        let policy = CorsPolicy::new(vec!["https://good.example".into()]);

        let mut out = HeaderMap::new();
        policy.decorate(&headers(&[("origin", "https://good.example")]), &mut out);
        assert_eq!(out[ACCESS_CONTROL_ALLOW_ORIGIN], "https://good.example");

        let mut out = HeaderMap::new();
        policy.decorate(&headers(&[("origin", "https://evil.example")]), &mut out);
        assert!(out.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(out.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        // Static headers are still present
        assert_eq!(out[CONTENT_SECURITY_POLICY], CSP);
    }

    #[test]
    fn requested_headers_and_method_are_echoed() {
        let policy = CorsPolicy::default();
        let mut out = HeaderMap::new();
        policy.decorate(
            &headers(&[
                ("access-control-request-headers", "authorization, content-type"),
                ("access-control-request-method", "PATCH"),
            ]),
            &mut out,
        );
        assert_eq!(out[ACCESS_CONTROL_ALLOW_HEADERS], "authorization, content-type");
        assert_eq!(out[ACCESS_CONTROL_ALLOW_METHODS], "PATCH");
        assert_eq!(out[ACCESS_CONTROL_MAX_AGE], MAX_AGE);
    }

    #[test]
    fn missing_request_values_fall_back_to_wildcard() {
        let policy = CorsPolicy::default();
        let mut out = HeaderMap::new();
        policy.decorate(&headers(&[("access-control-request-headers", "")]), &mut out);
        assert_eq!(out[ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert_eq!(out[ACCESS_CONTROL_ALLOW_METHODS], "*");
    }

    fn app() -> Router {
        let policy = Arc::new(CorsPolicy::default());
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn_with_state(policy, cors_middleware))
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_204() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ping")
                    .header("origin", "https://app.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn regular_request_passes_through_with_headers() {
        let response = app()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_SECURITY_POLICY], CSP);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }
}
