// =============================================================================
// Bot Store — reads the desired running-bot set, stamps tick completion
// =============================================================================

use chrono::{DateTime, Utc};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::types::BotMode;

use super::client::StoreClient;

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRow {
    pub id: String,
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub pairs: Vec<String>,
    pub max_positions: i64,
    pub position_size: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub mode: BotMode,
    pub status: String,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub strategies: StrategyRow,
}

pub struct StoreBotClient {
    store: StoreClient,
}

impl StoreBotClient {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// The desired running-bot set, each embedding its strategy row. Rows
    /// that fail to decode are skipped with a warning rather than aborting
    /// the whole reconciliation pass.
    #[instrument(skip(self), name = "store::list_running_bots")]
    pub async fn list_running(&self) -> Result<Vec<BotRow>> {
        let rows = self
            .store
            .select("bot_instances", "select=*,strategies(*)&status=eq.running")
            .await
            .context("failed to list running bots")?;

        let mut bots = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<BotRow>(row) {
                Ok(bot) => bots.push(bot),
                Err(e) => warn!(error = %e, "skipping malformed bot_instances row"),
            }
        }
        Ok(bots)
    }

    /// Stamps `last_tick_at` after a successful tick.
    #[instrument(skip(self), name = "store::mark_tick")]
    pub async fn mark_tick(&self, bot_id: &str) -> Result<()> {
        let body = json!({ "last_tick_at": Utc::now().to_rfc3339() });
        self.store
            .update("bot_instances", &format!("id=eq.{bot_id}"), &body)
            .await
            .context("failed to stamp last_tick_at")?;
        Ok(())
    }
}
