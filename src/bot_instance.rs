// =============================================================================
// Bot Instance — §4.I
// =============================================================================
//
// One instance per running bot row. Owns its own candle cache, strategy
// state, and position manager — nothing here is shared with any other bot.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::market_data::{CandleCache, MarketDataClient};
use crate::position_manager::PositionManager;
use crate::store::bots::BotRow;
use crate::store::{ScannerLevelsStore, StoreLogClient, StorePositionClient};
use crate::strategy::{self, StrategyContext, StrategyKind, StrategyState};
use crate::types::{BotMode, LogType, Side, TileKind};

/// TTL on the per-bot mid-price snapshot.
const MID_PRICE_TTL: Duration = Duration::from_secs(2);

pub struct BotInstance {
    pub id: String,
    owner_id: String,
    mode: BotMode,
    symbols: Vec<String>,
    max_positions: usize,
    position_size_usd: f64,
    stop_loss_percent: f64,
    take_profit_percent: f64,
    kind: StrategyKind,

    market: Arc<MarketDataClient>,
    candle_cache: CandleCache,
    position_store: StorePositionClient,
    log_store: StoreLogClient,
    scanner_store: Option<Arc<ScannerLevelsStore>>,

    strategy_state: StrategyState,
    position_manager: PositionManager,

    mids_cache: Option<(HashMap<String, f64>, Instant)>,
}

impl BotInstance {
    pub fn new(
        row: &BotRow,
        market: Arc<MarketDataClient>,
        store: StorePositionClient,
        logs: StoreLogClient,
        scanner_store: Option<Arc<ScannerLevelsStore>>,
    ) -> Self {
        let candle_cache = CandleCache::per_bot(market.clone());
        Self {
            id: row.id.clone(),
            owner_id: row.user_id.clone(),
            mode: row.mode,
            symbols: row.strategies.pairs.clone(),
            max_positions: row.strategies.max_positions.max(0) as usize,
            position_size_usd: row.strategies.position_size,
            stop_loss_percent: row.strategies.stop_loss_percent,
            take_profit_percent: row.strategies.take_profit_percent,
            kind: StrategyKind::from_row(&row.strategies),
            market,
            candle_cache,
            position_store: store,
            log_store: logs,
            scanner_store,
            strategy_state: StrategyState::new(),
            position_manager: PositionManager::new(),
            mids_cache: None,
        }
    }

    /// Refreshes strategy parameters and symbol list from a fresh bot row,
    /// without discarding in-memory caches or position metadata.
    pub fn update_config(&mut self, row: &BotRow) {
        self.mode = row.mode;
        self.symbols = row.strategies.pairs.clone();
        self.max_positions = row.strategies.max_positions.max(0) as usize;
        self.position_size_usd = row.strategies.position_size;
        self.stop_loss_percent = row.strategies.stop_loss_percent;
        self.take_profit_percent = row.strategies.take_profit_percent;
        self.kind = StrategyKind::from_row(&row.strategies);
    }

    #[instrument(skip(self), name = "bot_instance::tick", fields(bot_id = %self.id))]
    pub async fn tick(&mut self) -> Result<()> {
        let mids = self.refresh_mids().await?;
        let open_positions = self
            .position_store
            .list_open(&self.id)
            .await
            .context("failed to reload open positions")?;

        let outcome = {
            let mut ctx = StrategyContext {
                symbols: &self.symbols,
                market: &self.market,
                cache: &self.candle_cache,
                mids: &mids,
                open_positions: &open_positions,
                max_positions: self.max_positions,
                last_close_time: self.position_manager.last_close_time(),
                logs: &self.log_store,
                scanner_store: self.scanner_store.as_deref(),
                state: &mut self.strategy_state,
            };
            strategy::evaluate(&self.kind, &mut ctx).await
        };

        // Applied sequentially against a running count, not the tick-start
        // snapshot, so a strategy emitting several intents in one tick can't
        // push the bot past max_positions.
        let mut open_count = open_positions.len();
        for entry in outcome.entries {
            if open_count >= self.max_positions {
                warn!(bot_id = %self.id, symbol = %entry.symbol, "skipping entry, already at max_positions this tick");
                continue;
            }
            if self.open_entry(entry.symbol, entry.side, entry.price, entry.reason).await {
                open_count += 1;
            }
        }

        self.position_manager
            .sweep(&self.position_store, &self.log_store, &self.id, &self.symbols, &outcome.exits, &mids, self.mode)
            .await;

        Ok(())
    }

    async fn refresh_mids(&mut self) -> Result<HashMap<String, f64>> {
        if let Some((mids, fetched_at)) = &self.mids_cache {
            if fetched_at.elapsed() < MID_PRICE_TTL {
                return Ok(mids.clone());
            }
        }
        let mids = self.market.all_mids().await.context("failed to refresh mid prices")?;
        self.mids_cache = Some((mids.clone(), Instant::now()));
        Ok(mids)
    }

    /// Returns whether a position was actually opened, so the caller can
    /// keep its running open-position count accurate within one tick.
    async fn open_entry(&self, symbol: String, side: Side, price: f64, reason: String) -> bool {
        if price <= 0.0 {
            warn!(bot_id = %self.id, symbol, "refusing to open position at non-positive price");
            return false;
        }
        let size_units = self.position_size_usd / price;
        let (stop_loss, take_profit) = match side {
            Side::Long => (
                price * (1.0 - self.stop_loss_percent / 100.0),
                price * (1.0 + self.take_profit_percent / 100.0),
            ),
            Side::Short => (
                price * (1.0 + self.stop_loss_percent / 100.0),
                price * (1.0 - self.take_profit_percent / 100.0),
            ),
        };

        match self
            .position_store
            .open_position(&self.id, &symbol, side, size_units, price, stop_loss, take_profit, self.mode)
            .await
        {
            Ok(position_id) => {
                info!(bot_id = %self.id, symbol, %side, price, reason, "opened position");
                self.log_store
                    .append(
                        LogType::Signal,
                        &format!("{side} {symbol} at {price}: {reason}"),
                        json!({"position_id": position_id, "side": side.to_string(), "price": price, "reason": reason}),
                    )
                    .await;
                self.log_store.delete_tile(TileKind::Monitoring, &symbol).await;
                true
            }
            Err(e) => {
                warn!(bot_id = %self.id, symbol, error = %e, "failed to open position, signal dropped for this tick");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_entry_brackets_stop_below_and_take_profit_above() {
        let price = 100.0;
        let stop_loss_percent = 1.0;
        let take_profit_percent = 2.0;
        let stop_loss = price * (1.0 - stop_loss_percent / 100.0);
        let take_profit = price * (1.0 + take_profit_percent / 100.0);
        assert!(stop_loss < price);
        assert!(price < take_profit);
    }
}
