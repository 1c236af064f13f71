//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway and health routes
//! - Wire up middleware (CORS/CSP, tracing)
//! - Apply hot-reloaded rate limits to the running guard
//! - Serve until shutdown, then close open gateway connections

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::gateway::{gateway_handler, CommandHandler, EchoHandler, GatewayGuard, GatewayState};
use crate::lifecycle::Shutdown;
use crate::security::cors::{cors_middleware, CorsPolicy};

/// HTTP/WebSocket server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    guard: GatewayGuard,
    shutdown: Arc<Shutdown>,
}

impl GatewayServer {
    /// Create a server that echoes accepted commands.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_handler(config, Arc::new(EchoHandler))
    }

    /// Create a server dispatching accepted commands to `handler`.
    pub fn with_handler(config: GatewayConfig, handler: Arc<dyn CommandHandler>) -> Self {
        let guard = GatewayGuard::new(config.rate_limit.clone());
        let shutdown = Arc::new(Shutdown::new());

        let state = GatewayState {
            guard: guard.clone(),
            handler,
            shutdown: shutdown.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            guard,
            shutdown,
        }
    }

    fn build_router(config: &GatewayConfig, state: GatewayState) -> Router {
        let cors = Arc::new(CorsPolicy::from_config(&config.cors));

        Router::new()
            .route(&config.listener.path, get(gateway_handler))
            .route("/health", get(health))
            .with_state(state)
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Handle to the limiter shared with the admin API.
    pub fn guard(&self) -> &GatewayGuard {
        &self.guard
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.listener.path,
            "Gateway server starting"
        );

        let guard = self.guard.clone();
        let mut reload_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => guard.update_limits(config.rate_limit),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let internal = self.shutdown.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                internal.trigger();
            })
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
