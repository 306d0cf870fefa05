//! WebSocket Support for Real-time Game Events
//!
//! Streams every engine event (round starts, multiplier ticks, crashes,
//! cashouts) to connected clients and accepts cashout requests over the
//! same connection, so a player never loses the race against the crash
//! to an extra HTTP round trip.

use super::handlers::AppState;
use crate::game::engine::EngineHandle;
use crate::game::types::{Currency, RoundStatus};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::monitoring::MetricsRegistry;

/// Messages a client may send over the socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// Cash out the player's active bet at the current multiplier
    #[serde(rename = "cashout")]
    Cashout { player_id: Uuid },
}

/// Direct replies to a single client, distinct from the broadcast events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientReply {
    /// Welcome frame with the live round snapshot
    #[serde(rename = "connected")]
    Connected {
        round_id: Uuid,
        status: RoundStatus,
        multiplier: f64,
    },

    #[serde(rename = "cashout_success")]
    CashoutSuccess {
        username: String,
        cashout_multiplier: f64,
        payout_crypto: f64,
        currency: Currency,
    },

    #[serde(rename = "cashout_error")]
    CashoutError { message: String },
}

/// Shared context handed to every accepted socket
#[derive(Clone)]
pub struct WsManager {
    engine: EngineHandle,
    metrics: MetricsRegistry,
}

impl WsManager {
    pub fn new(engine: EngineHandle, metrics: MetricsRegistry) -> Self {
        Self { engine, metrics }
    }

    /// Accept the protocol upgrade and hand the socket off.
    pub async fn handle_upgrade(&self, ws: WebSocketUpgrade) -> Response {
        let manager = self.clone();
        ws.on_upgrade(move |socket| async move { manager.handle_connection(socket).await })
    }

    /// Drive one client connection until either side closes.
    async fn handle_connection(&self, socket: WebSocket) {
        let client_id = generate_client_id();
        let client_count = self.metrics.client_connected();

        info!(
            "🔌 WebSocket client {} connected (total: {})",
            client_id, client_count
        );

        let (mut sender, mut receiver) = socket.split();
        let mut events = self.engine.subscribe();

        // Direct replies from the receive task are funnelled through this
        // channel so only the send task writes to the socket.
        let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(16);

        // Welcome frame with the live round state.
        if let Ok(snapshot) = self.engine.snapshot().await {
            let welcome = ClientReply::Connected {
                round_id: snapshot.round_id,
                status: snapshot.status,
                multiplier: snapshot.multiplier,
            };
            if let Ok(json) = serde_json::to_string(&welcome) {
                if sender.send(Message::Text(json)).await.is_err() {
                    warn!("Failed to send welcome frame to client {}", client_id);
                    self.metrics.client_disconnected();
                    return;
                }
            }
        }

        let metrics = self.metrics.clone();
        let send_client_id = client_id.clone();

        // Task to push broadcast events and direct replies to the client
        let send_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => match serde_json::to_string(&event) {
                            Ok(json) => Message::Text(json),
                            Err(e) => {
                                error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            metrics.record_ws_lag(skipped);
                            warn!(
                                "Client {} lagged, skipped {} events",
                                send_client_id, skipped
                            );
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    reply = reply_rx.recv() => match reply {
                        Some(message) => message,
                        None => break,
                    },
                };

                if sender.send(message).await.is_err() {
                    debug!("Client {} disconnected", send_client_id);
                    break;
                }
                metrics.record_ws_message();
            }
        });

        let engine = self.engine.clone();
        let metrics = self.metrics.clone();
        let recv_client_id = client_id.clone();

        // Task to handle incoming messages from the client
        let receive_task = tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply =
                            handle_client_message(&engine, &metrics, &recv_client_id, &text).await;
                        let Ok(json) = serde_json::to_string(&reply) else {
                            continue;
                        };
                        if reply_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Client {} requested close", recv_client_id);
                        break;
                    }
                    Ok(Message::Pong(_)) => {
                        debug!("Received pong from client {}", recv_client_id);
                    }
                    Err(e) => {
                        warn!("WebSocket error from client {}: {}", recv_client_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        // When either side finishes, the channel closure unwinds the other:
        // a dropped reply_tx ends the send loop, a dead socket fails the
        // receive task's next reply send.
        tokio::select! {
            _ = send_task => {
                debug!("Send side closed for client {}", client_id);
            }
            _ = receive_task => {
                debug!("Receive side closed for client {}", client_id);
            }
        }

        let remaining = self.metrics.client_disconnected();
        info!(
            "🔌 WebSocket client {} disconnected (remaining: {})",
            client_id, remaining
        );
    }
}

/// Parse and execute one client message, producing the direct reply.
async fn handle_client_message(
    engine: &EngineHandle,
    metrics: &MetricsRegistry,
    client_id: &str,
    text: &str,
) -> ClientReply {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Cashout { player_id }) => {
            debug!("Client {} requested cashout for {}", client_id, player_id);
            match engine.cash_out(player_id).await {
                Ok(receipt) => {
                    metrics.record_cashout();
                    ClientReply::CashoutSuccess {
                        username: receipt.username,
                        cashout_multiplier: receipt.cashout_multiplier,
                        payout_crypto: receipt.payout_crypto,
                        currency: receipt.currency,
                    }
                }
                Err(e) => ClientReply::CashoutError {
                    message: e.to_string(),
                },
            }
        }
        Err(_) => ClientReply::CashoutError {
            message: "Unrecognized message".to_string(),
        },
    }
}

/// Process-unique client id for log correlation
fn generate_client_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);

    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Router entry point for the `/ws` route
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    state.ws.handle_upgrade(ws).await
}
