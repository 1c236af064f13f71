//! Gateway guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 GATEWAY GUARD                 │
//!   WebSocket upgrade   │  ┌────────┐   ┌───────────┐   ┌────────────┐ │
//!   ────────────────────┼─▶│  cors  │──▶│ admission │──▶│  command   │ │
//!                       │  │headers │   │ (per-IP)  │   │  windows   │ │
//!                       │  └────────┘   └───────────┘   └─────┬──────┘ │
//!                       │                                     │        │
//!   close 4008 / 1001   │                          allowed    ▼        │
//!   ◀───────────────────┼──────────────────────── CommandHandler       │
//!                       │                                              │
//!                       │  config + watcher · logging · metrics ·      │
//!                       │  admin API · shutdown                        │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gateway_guard::admin::{setup_admin_router, AdminState};
use gateway_guard::config::{load_config, ConfigWatcher, GatewayConfig};
use gateway_guard::lifecycle::{shutdown_signal, Shutdown};
use gateway_guard::observability::{logging, metrics};
use gateway_guard::GatewayServer;

#[derive(Parser)]
#[command(name = "gateway-guard")]
#[command(about = "Rate-limited WebSocket gateway", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("gateway-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_commands = config.rate_limit.max_commands,
        window_ms = config.rate_limit.window_ms,
        max_connections_per_ip = config.rate_limit.max_connections_per_ip,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hot reload. The watcher handle must outlive the server.
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(async move {
                while let Some(update) = updates.recv().await {
                    if config_tx.send(update).is_err() {
                        break;
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config.clone());

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin = setup_admin_router(AdminState::new(server.guard().clone(), &config.admin.api_key));
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
