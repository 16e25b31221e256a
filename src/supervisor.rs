// =============================================================================
// Supervisor — §4.J
// =============================================================================
//
// Reconciles the desired running-bot set against the in-memory map of live
// bot instances, dispatches one tick per bot per second, and never exits.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::bot_instance::BotInstance;
use crate::market_data::MarketDataClient;
use crate::store::{ScannerLevelsStore, StoreBotClient, StoreClient, StoreLogClient, StorePositionClient};
use crate::types::LogType;

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct Supervisor {
    store: StoreClient,
    bots_store: StoreBotClient,
    market: Arc<MarketDataClient>,
    scanner_store: Arc<ScannerLevelsStore>,
    instances: HashMap<String, BotInstance>,
}

impl Supervisor {
    pub fn new(store: StoreClient, market: Arc<MarketDataClient>, scanner_store: Arc<ScannerLevelsStore>) -> Self {
        let bots_store = StoreBotClient::new(store.clone());
        Self { store, bots_store, market, scanner_store, instances: HashMap::new() }
    }

    /// Runs forever at [`TICK_INTERVAL`]. On a reconciliation-loop exception,
    /// logs and backs off for [`ERROR_BACKOFF`] before continuing.
    pub async fn run(mut self) {
        info!("supervisor started");
        loop {
            if let Err(e) = self.reconcile_and_tick().await {
                error!(error = %e, "supervisor loop error, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
            tokio::time::sleep(TICK_INTERVAL).await;
        }
    }

    async fn reconcile_and_tick(&mut self) -> anyhow::Result<()> {
        let rows = self.bots_store.list_running().await?;
        let mut seen = HashSet::with_capacity(rows.len());

        for row in &rows {
            seen.insert(row.id.clone());

            let instance = match self.instances.get_mut(&row.id) {
                Some(instance) => {
                    instance.update_config(row);
                    instance
                }
                None => {
                    let position_store = StorePositionClient::new(self.store.clone());
                    let log_store = StoreLogClient::new(self.store.clone(), row.id.clone(), row.user_id.clone());
                    let instance = BotInstance::new(
                        row,
                        self.market.clone(),
                        position_store,
                        log_store,
                        Some(self.scanner_store.clone()),
                    );
                    self.instances.entry(row.id.clone()).or_insert(instance)
                }
            };

            match instance.tick().await {
                Ok(()) => {
                    if let Err(e) = self.bots_store.mark_tick(&row.id).await {
                        warn!(bot_id = %row.id, error = %e, "failed to stamp last_tick_at");
                    }
                }
                Err(e) => {
                    error!(bot_id = %row.id, error = %e, "bot tick failed");
                    let log_store = StoreLogClient::new(self.store.clone(), row.id.clone(), row.user_id.clone());
                    log_store
                        .append(LogType::Error, &format!("tick failed: {e}"), serde_json::json!({}))
                        .await;
                }
            }
        }

        self.instances.retain(|id, _| seen.contains(id));
        Ok(())
    }
}
