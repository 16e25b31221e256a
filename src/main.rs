// =============================================================================
// Execution Engine — entry point
// =============================================================================
//
// Boots configuration, wires the store and market-data clients, and spawns
// the three long-running tasks: the supervisor (bot reconciliation loop),
// the scanner (support/resistance publisher), and the health endpoint.
// Any one of them exiting is treated as fatal.
// =============================================================================

mod bot_instance;
mod config;
mod health;
mod levels;
mod market_data;
mod position;
mod position_manager;
mod scanner;
mod store;
mod strategy;
mod supervisor;
mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use config::Config;
use market_data::MarketDataClient;
use scanner::ScannerWorker;
use store::{ScannerLevelsStore, StoreClient};
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let config = Config::from_env()?;
    info!(health_port = config.health_port, "starting execution engine");

    let store = StoreClient::new(config.store_url.clone(), config.store_service_key.clone())?;
    let market = Arc::new(MarketDataClient::new(config.exchange_api_url.clone()));
    let scanner_store = Arc::new(ScannerLevelsStore::new(store.clone()));

    let supervisor = Supervisor::new(store, market.clone(), scanner_store.clone());
    let scanner_worker =
        ScannerWorker::with_symbols_override(market, (*scanner_store).clone(), config.symbols_override.clone());

    let supervisor_task = tokio::spawn(supervisor.run());
    let scanner_task = tokio::spawn(scanner_worker.run());

    let health_app = health::router();
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.health_port)).await?;
    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_app).await {
            error!(error = %e, "health endpoint exited");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = supervisor_task => {
            error!("supervisor task exited unexpectedly");
        }
        _ = scanner_task => {
            error!("scanner task exited unexpectedly");
        }
        _ = health_task => {
            error!("health task exited unexpectedly");
        }
    }

    Ok(())
}
