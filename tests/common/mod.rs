//! Shared utilities for gateway integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use gateway_guard::config::GatewayConfig;
use gateway_guard::{GatewayGuard, GatewayServer, Shutdown};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A gateway running on an ephemeral local port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub guard: GatewayGuard,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a gateway with `config`, bound to 127.0.0.1 on a free port.
pub async fn start_gateway(mut config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = GatewayServer::new(config);
    let guard = server.guard().clone();
    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        guard,
        shutdown,
        config_tx,
    }
}

/// Connect, retrying while the server is still releasing a previous slot.
#[allow(dead_code)]
pub async fn connect_eventually(url: &str) -> Client {
    for _ in 0..50 {
        if let Ok((ws, _)) = connect_async(url).await {
            return ws;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("could not connect to {url}");
}

/// Poll `check` until it holds or a second has passed.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
