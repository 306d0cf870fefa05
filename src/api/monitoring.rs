//! Monitoring & Metrics
//!
//! Prometheus-compatible counters for rounds, bets and WebSocket clients.
//! Round counters are fed from the engine event stream so they stay correct
//! no matter which code path started or crashed the round.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::game::engine::EngineHandle;
use crate::game::events::GameEvent;

/// Prometheus-compatible metrics registry
#[derive(Clone)]
pub struct MetricsRegistry {
    /// Round lifecycle counters
    pub rounds_started_total: Arc<AtomicU64>,
    pub rounds_crashed_total: Arc<AtomicU64>,

    /// Gameplay counters
    pub bets_placed_total: Arc<AtomicU64>,
    pub cashouts_total: Arc<AtomicU64>,

    /// WebSocket metrics
    pub ws_connections_active: Arc<AtomicU64>,
    pub ws_messages_sent_total: Arc<AtomicU64>,
    pub ws_lagged_events_total: Arc<AtomicU64>,

    /// Archive worker failures
    pub archive_failures_total: Arc<AtomicU64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            rounds_started_total: Arc::new(AtomicU64::new(0)),
            rounds_crashed_total: Arc::new(AtomicU64::new(0)),
            bets_placed_total: Arc::new(AtomicU64::new(0)),
            cashouts_total: Arc::new(AtomicU64::new(0)),
            ws_connections_active: Arc::new(AtomicU64::new(0)),
            ws_messages_sent_total: Arc::new(AtomicU64::new(0)),
            ws_lagged_events_total: Arc::new(AtomicU64::new(0)),
            archive_failures_total: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record an accepted bet
    pub fn record_bet(&self) {
        self.bets_placed_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a settled cashout
    pub fn record_cashout(&self) {
        self.cashouts_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a message pushed to a WebSocket client
    pub fn record_ws_message(&self) {
        self.ws_messages_sent_total.fetch_add(1, Ordering::SeqCst);
    }

    /// Record events dropped for a lagging WebSocket client
    pub fn record_ws_lag(&self, skipped: u64) {
        self.ws_lagged_events_total
            .fetch_add(skipped, Ordering::SeqCst);
    }

    /// Returns the new connection count
    pub fn client_connected(&self) -> u64 {
        self.ws_connections_active.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the new connection count
    pub fn client_disconnected(&self) -> u64 {
        self.ws_connections_active
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1)
    }

    /// Generate Prometheus metrics format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP crashpoint_rounds_started_total Total number of rounds started\n\
             # TYPE crashpoint_rounds_started_total counter\n\
             crashpoint_rounds_started_total {}\n\n",
            self.rounds_started_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_rounds_crashed_total Total number of rounds crashed\n\
             # TYPE crashpoint_rounds_crashed_total counter\n\
             crashpoint_rounds_crashed_total {}\n\n",
            self.rounds_crashed_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_bets_placed_total Total number of accepted bets\n\
             # TYPE crashpoint_bets_placed_total counter\n\
             crashpoint_bets_placed_total {}\n\n",
            self.bets_placed_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_cashouts_total Total number of settled cashouts\n\
             # TYPE crashpoint_cashouts_total counter\n\
             crashpoint_cashouts_total {}\n\n",
            self.cashouts_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_ws_connections_active Active WebSocket connections\n\
             # TYPE crashpoint_ws_connections_active gauge\n\
             crashpoint_ws_connections_active {}\n\n",
            self.ws_connections_active.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_ws_messages_sent_total WebSocket messages sent\n\
             # TYPE crashpoint_ws_messages_sent_total counter\n\
             crashpoint_ws_messages_sent_total {}\n\n",
            self.ws_messages_sent_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_ws_lagged_events_total Events dropped for lagging WebSocket clients\n\
             # TYPE crashpoint_ws_lagged_events_total counter\n\
             crashpoint_ws_lagged_events_total {}\n\n",
            self.ws_lagged_events_total.load(Ordering::SeqCst)
        ));

        output.push_str(&format!(
            "# HELP crashpoint_archive_failures_total Failed writes in the archive worker\n\
             # TYPE crashpoint_archive_failures_total counter\n\
             crashpoint_archive_failures_total {}\n\n",
            self.archive_failures_total.load(Ordering::SeqCst)
        ));

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Count round lifecycle events from the engine broadcast stream.
pub fn spawn_event_counter(registry: MetricsRegistry, engine: EngineHandle) {
    tokio::spawn(async move {
        let mut events = engine.subscribe();
        loop {
            match events.recv().await {
                Ok(GameEvent::RoundStart { .. }) => {
                    registry.rounds_started_total.fetch_add(1, Ordering::SeqCst);
                }
                Ok(GameEvent::RoundCrash { .. }) => {
                    registry.rounds_crashed_total.fetch_add(1, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Metrics event counter lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Metrics event counter stopped");
    });
}

/// Axum handler for the Prometheus metrics endpoint
pub async fn metrics_handler(
    State(state): State<Arc<super::handlers::AppState>>,
) -> impl IntoResponse {
    let body = state.metrics.to_prometheus_format();
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}
