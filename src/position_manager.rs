// =============================================================================
// Position Manager — §4.H
// =============================================================================
//
// Runs once per bot tick, after strategy evaluation: reconciles in-memory
// metadata against the store's positions, marks live pnl, arms break-even
// protection, fires standard TP/SL exits, and refreshes status tiles.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::position::{Position, PositionMetadata};
use crate::store::{StoreLogClient, StorePositionClient};
use crate::strategy::StrategyExit;
use crate::types::{BotMode, Side, TileKind};

/// `pnl_pct` at which the stop is moved to entry, one-shot.
const BREAK_EVEN_TRIGGER_PCT: f64 = 0.15;

const POSITION_STATUS_INTERVAL: Duration = Duration::from_secs(5);
const MONITORING_INTERVAL: Duration = Duration::from_secs(5);

pub struct PositionManager {
    metadata: HashMap<String, PositionMetadata>,
    last_position_status_log: HashMap<String, Instant>,
    last_monitoring_log: HashMap<String, Instant>,
    /// symbol → time of the most recent close, for the entry cooldown.
    last_close_time: HashMap<String, Instant>,
}

/// Outcome of one sweep: positions that are still open (to feed back into
/// the bot's in-memory list) and the symbols freed up for re-entry.
pub struct SweepReport {
    pub still_open: Vec<Position>,
    pub closed_symbols: Vec<String>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            metadata: HashMap::new(),
            last_position_status_log: HashMap::new(),
            last_monitoring_log: HashMap::new(),
            last_close_time: HashMap::new(),
        }
    }

    pub fn last_close_time(&self) -> &HashMap<String, Instant> {
        &self.last_close_time
    }

    /// Runs the five-step sweep described in §4.H. `strategy_exits` carries
    /// any exit intents a stateful strategy (orderbook_imbalance_v2) raised
    /// this tick, independent of the standard TP/SL check.
    pub async fn sweep(
        &mut self,
        store: &StorePositionClient,
        logs: &StoreLogClient,
        bot_id: &str,
        monitored_symbols: &[String],
        strategy_exits: &[StrategyExit],
        current_prices: &HashMap<String, f64>,
        mode: BotMode,
    ) -> SweepReport {
        // Step 1: source of truth is the store, not our in-memory list.
        let open_positions = match store.list_open(bot_id).await {
            Ok(positions) => positions,
            Err(e) => {
                error!(bot_id, error = %e, "failed to reload open positions, skipping sweep");
                return SweepReport { still_open: Vec::new(), closed_symbols: Vec::new() };
            }
        };

        for position in &open_positions {
            self.metadata
                .entry(position.id.clone())
                .or_insert_with(|| PositionMetadata::new_at_entry(position.entry_price, position.stop_loss));
        }
        self.metadata.retain(|id, _| open_positions.iter().any(|p| &p.id == id));

        let mut still_open = Vec::with_capacity(open_positions.len());
        let mut closed_symbols = Vec::new();

        for position in open_positions {
            let current_price = current_prices.get(&position.symbol).copied().unwrap_or(position.current_price);

            // Step 2: mark pnl.
            let pnl = position.pnl(current_price);
            let pnl_pct = position.pnl_pct(current_price);
            if let Err(e) = store.mark_position(&position.id, current_price, pnl).await {
                warn!(position_id = %position.id, error = %e, "failed to mark position");
            }

            // Step 3: metadata peaks.
            if let Some(meta) = self.metadata.get_mut(&position.id) {
                let better = match position.side {
                    Side::Long => current_price > meta.highest_profit_price,
                    Side::Short => current_price < meta.highest_profit_price,
                };
                if better {
                    meta.highest_profit_price = current_price;
                    meta.highest_profit_pct = meta.highest_profit_pct.max(pnl_pct);
                }
                if pnl_pct > 0.0 && meta.first_profit_time.is_none() {
                    meta.first_profit_time = Some(Utc::now());
                }
            }

            // Step 4: break-even protection, one-shot.
            let mut stop_loss = position.stop_loss;
            if pnl_pct >= BREAK_EVEN_TRIGGER_PCT {
                let on_loss_side = match position.side {
                    Side::Long => stop_loss < position.entry_price,
                    Side::Short => stop_loss > position.entry_price,
                };
                if on_loss_side {
                    stop_loss = position.entry_price;
                    if let Err(e) = store.adjust_stop(&position.id, stop_loss).await {
                        warn!(position_id = %position.id, error = %e, "failed to move stop to break-even");
                    }
                }
            }

            // Explicit strategy-driven exit (orderbook_imbalance_v2) takes priority.
            let strategy_exit = strategy_exits.iter().find(|e| e.position_id == position.id);

            let (should_exit, reason) = if let Some(exit) = strategy_exit {
                (true, exit.reason.clone())
            } else {
                match position.side {
                    Side::Long if current_price <= stop_loss => (true, "Stop Loss".to_string()),
                    Side::Long if current_price >= position.take_profit => (true, "Take Profit".to_string()),
                    Side::Short if current_price >= stop_loss => (true, "Stop Loss".to_string()),
                    Side::Short if current_price <= position.take_profit => (true, "Take Profit".to_string()),
                    _ => (false, String::new()),
                }
            };

            if should_exit {
                let close_pnl = position.pnl(current_price);
                match store.close_position(&position, current_price, close_pnl, &reason, mode).await {
                    Ok(()) => {
                        self.metadata.remove(&position.id);
                        logs.delete_tile(TileKind::PositionStatus, &position.symbol).await;
                        self.last_close_time.insert(position.symbol.clone(), Instant::now());
                        closed_symbols.push(position.symbol.clone());
                        logs.append(
                            crate::types::LogType::Trade,
                            &format!("Closed {} on {}: {}", position.side, position.symbol, reason),
                            json!({"position_id": position.id, "pnl": close_pnl, "reason": reason}),
                        )
                        .await;
                    }
                    Err(e) => {
                        // §7: leave in memory so the next tick retries the close.
                        error!(position_id = %position.id, error = %e, "failed to close position, will retry next tick");
                        still_open.push(position);
                    }
                }
                continue;
            }

            // Step 6: refresh the position-status tile at most every 5s.
            let due = self
                .last_position_status_log
                .get(&position.id)
                .map(|t| t.elapsed() >= POSITION_STATUS_INTERVAL)
                .unwrap_or(true);
            if due {
                logs.update_tile(
                    TileKind::PositionStatus,
                    &position.symbol,
                    &format!("{} {} pnl {:.2}%", position.side, position.symbol, pnl_pct),
                    json!({
                        "position_id": position.id,
                        "current_price": current_price,
                        "pnl": pnl,
                        "pnl_pct": pnl_pct,
                        "stop_loss": stop_loss,
                    }),
                )
                .await;
                self.last_position_status_log.insert(position.id.clone(), Instant::now());
            }

            still_open.push(position);
        }

        // Monitoring tile for symbols without an open position.
        let open_symbols: Vec<&str> = still_open.iter().map(|p| p.symbol.as_str()).collect();
        for symbol in monitored_symbols {
            if open_symbols.contains(&symbol.as_str()) {
                continue;
            }
            let due = self
                .last_monitoring_log
                .get(symbol)
                .map(|t| t.elapsed() >= MONITORING_INTERVAL)
                .unwrap_or(true);
            if due {
                logs.update_tile(TileKind::Monitoring, symbol, "monitoring", json!({})).await;
                self.last_monitoring_log.insert(symbol.clone(), Instant::now());
            }
        }

        SweepReport { still_open, closed_symbols }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_even_trigger_matches_spec_scenario_six() {
        // Long opened at 200.00; price reaches 200.30 -> pnl_pct = 0.15%.
        let pnl_pct = (200.30 - 200.00) / 200.00 * 100.0;
        assert!((pnl_pct - BREAK_EVEN_TRIGGER_PCT).abs() < 1e-9);
    }

    #[test]
    fn new_position_manager_starts_empty() {
        let pm = PositionManager::new();
        assert!(pm.last_close_time().is_empty());
    }
}
