//! Route Definitions
//!
//! The full URL surface of the service in one place.

use super::{handlers::*, monitoring::metrics_handler, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Assemble every route over the shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness probe
        .route("/health", get(health_handler))

        // Account endpoints
        .route("/api/users", post(create_user_handler))
        .route("/api/users/:user_id/wallet", get(wallet_handler))
        .route("/api/users/:user_id/transactions", get(transactions_handler))

        // Gameplay endpoints
        .route("/api/game/bet", post(place_bet_handler))
        .route("/api/game/cashout", post(cashout_handler))
        .route("/api/game/state", get(game_state_handler))

        // Round archive and fairness verification
        .route("/api/game/history", get(history_handler))
        .route("/api/game/verify", get(verify_handler))

        // WebSocket endpoint for real-time round events
        .route("/ws", get(websocket_handler))

        // Prometheus scrape target
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
