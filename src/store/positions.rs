// =============================================================================
// Position Store Adapter — CRUD on positions and trades
// =============================================================================

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::position::{Position, Trade};
use crate::types::{BotMode, Side, TradeSide};

use super::client::StoreClient;

#[derive(Serialize)]
struct NewPositionRow<'a> {
    bot_id: &'a str,
    symbol: &'a str,
    side: Side,
    size: f64,
    entry_price: f64,
    current_price: f64,
    stop_loss: f64,
    take_profit: f64,
    status: &'static str,
    unrealized_pnl: f64,
}

#[derive(Serialize)]
struct NewTradeRow<'a> {
    bot_id: &'a str,
    position_id: &'a str,
    symbol: &'a str,
    side: TradeSide,
    size: f64,
    price: f64,
    pnl: Option<f64>,
    mode: BotMode,
}

pub struct StorePositionClient {
    store: StoreClient,
}

impl StorePositionClient {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Inserts a position row and its opening trade row, returning the new
    /// position id. If the position insert fails, the trade insert is never
    /// attempted. If the trade insert fails after the position was created,
    /// the error surfaces but the position row is not rolled back — the
    /// caller (position manager) must not add the position to its in-memory
    /// list in that case (§7: "do not append to in-memory positions list").
    #[instrument(skip(self), name = "store::open_position")]
    #[allow(clippy::too_many_arguments)]
    pub async fn open_position(
        &self,
        bot_id: &str,
        symbol: &str,
        side: Side,
        size_units: f64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        mode: BotMode,
    ) -> Result<String> {
        let row = NewPositionRow {
            bot_id,
            symbol,
            side,
            size: size_units,
            entry_price,
            current_price: entry_price,
            stop_loss,
            take_profit,
            status: "open",
            unrealized_pnl: 0.0,
        };
        let inserted = self
            .store
            .insert("bot_positions", &row)
            .await
            .context("failed to insert position row")?;
        let position_id = inserted
            .get("id")
            .and_then(|v| v.as_str())
            .context("inserted position row missing id")?
            .to_string();

        let trade_side = match side {
            Side::Long => TradeSide::Buy,
            Side::Short => TradeSide::Sell,
        };
        let trade = NewTradeRow {
            bot_id,
            position_id: &position_id,
            symbol,
            side: trade_side,
            size: size_units,
            price: entry_price,
            pnl: None,
            mode,
        };
        self.store
            .insert("bot_trades", &trade)
            .await
            .context("failed to insert opening trade row")?;

        Ok(position_id)
    }

    /// Live update of current price and unrealized pnl.
    #[instrument(skip(self), name = "store::mark_position")]
    pub async fn mark_position(&self, id: &str, current_price: f64, unrealized_pnl: f64) -> Result<()> {
        let body = json!({ "current_price": current_price, "unrealized_pnl": unrealized_pnl });
        self.store
            .update("bot_positions", &format!("id=eq.{id}"), &body)
            .await
            .context("failed to mark position")?;
        Ok(())
    }

    /// Break-even protection: move the stored stop to `new_stop`.
    #[instrument(skip(self), name = "store::adjust_stop")]
    pub async fn adjust_stop(&self, id: &str, new_stop: f64) -> Result<()> {
        let body = json!({ "stop_loss": new_stop });
        self.store
            .update("bot_positions", &format!("id=eq.{id}"), &body)
            .await
            .context("failed to adjust stop loss")?;
        Ok(())
    }

    /// Closes the position and inserts a closing trade with signed pnl. On
    /// closing-trade insert failure, the position row has already moved to
    /// `closed` in the store; callers must keep the position in their
    /// in-memory list so the next tick retries (§7 policy decision — see
    /// the grounding ledger).
    #[instrument(skip(self), name = "store::close_position")]
    pub async fn close_position(
        &self,
        position: &Position,
        close_price: f64,
        pnl: f64,
        reason: &str,
        mode: BotMode,
    ) -> Result<()> {
        let body = json!({
            "status": "closed",
            "current_price": close_price,
            "unrealized_pnl": pnl,
            "closed_at": Utc::now().to_rfc3339(),
        });
        self.store
            .update("bot_positions", &format!("id=eq.{}", position.id), &body)
            .await
            .context("failed to close position")?;

        let trade_side = match position.side {
            Side::Long => TradeSide::Sell,
            Side::Short => TradeSide::Buy,
        };
        let trade = NewTradeRow {
            bot_id: &position.bot_id,
            position_id: &position.id,
            symbol: &position.symbol,
            side: trade_side,
            size: position.size,
            price: close_price,
            pnl: Some(pnl),
            mode,
        };
        if let Err(e) = self.store.insert("bot_trades", &trade).await {
            error!(position_id = %position.id, reason, error = %e, "failed to insert closing trade row after position was marked closed");
            return Err(e).context("failed to insert closing trade row");
        }
        Ok(())
    }

    /// Current open positions for a bot, used by the position manager's
    /// reconciliation read at the start of each tick.
    #[instrument(skip(self), name = "store::list_open")]
    pub async fn list_open(&self, bot_id: &str) -> Result<Vec<Position>> {
        let filter = format!("bot_id=eq.{bot_id}&status=eq.open");
        let rows = self
            .store
            .select("bot_positions", &filter)
            .await
            .context("failed to list open positions")?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<Position>(row) {
                Ok(position) => positions.push(position),
                Err(e) => warn!(bot_id, error = %e, "skipping malformed position row"),
            }
        }
        Ok(positions)
    }
}

/// Generates a client-side identifier for rows the store itself does not
/// assign one for. Currently unused — the store's insert returns the
/// server-generated id — kept for callers that need to pre-allocate one
/// (e.g. idempotent retries).
#[allow(dead_code)]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_produces_distinct_values() {
        assert_ne!(new_id(), new_id());
    }
}
