//! Crashpoint Server Binary
//!
//! Boots the full stack: configuration, round database, archiver,
//! accounts, price oracle, game engine, round driver and the
//! HTTP/WebSocket API.

use clap::Parser;
use crashpoint::accounts::AccountStore;
use crashpoint::api::handlers::AppState;
use crashpoint::api::monitoring::{self, MetricsRegistry};
use crashpoint::api::websocket::WsManager;
use crashpoint::api::ApiServer;
use crashpoint::config::ConfigLoader;
use crashpoint::game::engine::{run_round_driver, GameEngine};
use crashpoint::oracle::{CoinGeckoOracle, PriceSource};
use crashpoint::round_store::{Archiver, RoundStore};
use crashpoint::storage::Storage;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crashpoint")]
#[command(about = "Provably fair crash game server", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// API server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// API server port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Database directory (overrides config)
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crashpoint=debug,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    // CLI flags win over file and environment settings.
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.db_path = db_path;
    }
    config.validate()?;

    info!("🚀 Starting Crashpoint Server");

    info!("📂 Opening round database: {}", config.storage.db_path);
    let storage = Storage::open(&config.storage.db_path)?;
    info!("✅ Database opened successfully");

    let metrics = MetricsRegistry::new();

    let rounds = RoundStore::new(storage);
    let archive = Archiver::spawn_with_failure_counter(
        rounds.clone(),
        metrics.archive_failures_total.clone(),
    );

    let accounts = Arc::new(AccountStore::new());
    let oracle: Arc<dyn PriceSource> = Arc::new(CoinGeckoOracle::new(&config.oracle)?);

    let engine = GameEngine::spawn(accounts.clone(), oracle.clone(), archive);
    tokio::spawn(run_round_driver(
        engine.clone(),
        config.game.round_interval(),
    ));

    monitoring::spawn_event_counter(metrics.clone(), engine.clone());

    let ws = WsManager::new(engine.clone(), metrics.clone());

    let state = Arc::new(AppState {
        engine,
        accounts,
        oracle,
        rounds,
        ws,
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let server = ApiServer::new(config.server.clone(), state);
    server.run().await?;

    Ok(())
}
