//! WebSocket transport for the gateway.
//!
//! # Data Flow
//! ```text
//! GET /gateway (Upgrade: websocket)
//!     → GatewayGuard::on_connect(peer ip)   429 if the address is full
//!     → 101 Switching Protocols
//!     → per message: Text/Binary → on_command → CommandHandler
//!                    Ping/Pong   → transport only, not counted
//!     → close (client, rate limit 4008, or shutdown 1001) → on_disconnect
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::gateway::close_code::CloseCode;
use crate::gateway::lifecycle::{ConnectionLease, GatewayGuard, GatewaySocket};
use crate::lifecycle::Shutdown;
use crate::net::ConnectionIdentity;
use crate::security::GuardError;

/// Receives commands that passed the limiter.
pub trait CommandHandler: Send + Sync + 'static {
    /// Handle one command; a returned message is sent back to the client.
    fn handle(&self, connection: &ConnectionIdentity, command: Message) -> Option<Message>;
}

/// Replies with the command it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl CommandHandler for EchoHandler {
    fn handle(&self, _connection: &ConnectionIdentity, command: Message) -> Option<Message> {
        Some(command)
    }
}

/// State shared by every gateway connection.
#[derive(Clone)]
pub struct GatewayState {
    pub guard: GatewayGuard,
    pub handler: Arc<dyn CommandHandler>,
    pub shutdown: Arc<Shutdown>,
}

impl GatewaySocket for WebSocket {
    async fn close(&mut self, code: CloseCode) {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: Utf8Bytes::from_static(code.reason()),
        };
        if let Err(e) = self.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, code = %code, "Failed to send close frame");
        }
    }
}

/// Upgrade handler: admission happens before the handshake completes.
pub async fn gateway_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<GatewayState>,
) -> Response {
    let lease = match state.guard.on_connect(&peer.ip().to_string()) {
        Ok(lease) => lease,
        Err(GuardError::TooManyConnectionsForAddress { .. }) => {
            return (StatusCode::TOO_MANY_REQUESTS, "Too many connections from this address")
                .into_response();
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| serve_connection(socket, lease, state))
}

async fn serve_connection(mut socket: WebSocket, lease: ConnectionLease, state: GatewayState) {
    let mut shutdown = state.shutdown.subscribe();
    if state.shutdown.is_triggered() {
        socket.close(CloseCode::GOING_AWAY).await;
        state.guard.on_disconnect(&lease);
        return;
    }

    tracing::debug!(connection = %lease.identity(), "Gateway session started");

    loop {
        let message = tokio::select! {
            msg = socket.recv() => msg,
            _ = shutdown.recv() => {
                socket.close(CloseCode::GOING_AWAY).await;
                break;
            }
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(connection = %lease.identity(), error = %e, "Gateway receive error");
                break;
            }
            None => break,
        };

        match message {
            Message::Text(_) | Message::Binary(_) => {
                if !state.guard.on_command(&lease, &mut socket).await.is_allowed() {
                    break;
                }
                if let Some(reply) = state.handler.handle(lease.identity(), message) {
                    if socket.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    state.guard.on_disconnect(&lease);
}
