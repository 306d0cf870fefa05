//! API Server
//!
//! Server setup: middleware stack, listener and graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ServerConfig;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// HTTP and WebSocket front end over the shared application state
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Bind and serve until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = socket_addr(&self.config.host, self.config.port)?;

        info!("🌐 Starting Crashpoint API on http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ API Server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("🛑 API Server stopped");
        Ok(())
    }

    /// Router plus the cross-cutting layers. Layers added later sit
    /// outermost: `TraceLayer` sees every request, timeout and CORS run
    /// inside it, and the request id is innermost where handlers reach
    /// it through extensions.
    fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            .layer(TraceLayer::new_for_http())
    }

    fn log_server_info(&self) {
        info!("📋 Configuration:");
        info!("   Version: {}", self.state.version);
        info!("   Allowed origins: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);

        info!("📊 Available endpoints:");
        info!("   GET  /health                      - Health check");
        info!("   POST /api/users                   - Create account");
        info!("   GET  /api/users/:id/wallet        - Wallet balances");
        info!("   GET  /api/users/:id/transactions  - Transaction history");
        info!("   POST /api/game/bet                - Place bet");
        info!("   POST /api/game/cashout            - Cash out");
        info!("   GET  /api/game/state              - Live round state");
        info!("   GET  /api/game/history            - Finished rounds");
        info!("   GET  /api/game/verify             - Fairness verification");
        info!("   GET  /ws                          - Real-time event stream");
        info!("   GET  /metrics                     - Prometheus metrics");
    }
}

/// Listen address from the configured host and port. The host must be
/// an IP literal, not a hostname.
fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, std::net::AddrParseError> {
    Ok(SocketAddr::from((host.parse::<std::net::IpAddr>()?, port)))
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_parses_ip_and_port() {
        let addr = socket_addr("0.0.0.0", 3000).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        let v6 = socket_addr("::1", 8080).unwrap();
        assert!(v6.is_ipv6());
        assert_eq!(v6.port(), 8080);
    }

    #[test]
    fn socket_addr_rejects_hostnames() {
        assert!(socket_addr("localhost", 3000).is_err());
        assert!(socket_addr("", 3000).is_err());
    }
}
