// =============================================================================
// Position domain model
// =============================================================================
//
// `Position` is the store-backed record; `PositionMetadata` is purely
// in-memory, owned by the bot instance that opened it, and never persisted.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BotMode, Side, TradeSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub bot_id: String,
    pub symbol: String,
    pub side: Side,
    /// Base-asset units, never USD notional.
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: PositionStatus,
    pub unrealized_pnl: f64,
}

impl Position {
    /// `(current - entry) * size` for long, reversed for short.
    pub fn pnl(&self, current_price: f64) -> f64 {
        match self.side {
            Side::Long => (current_price - self.entry_price) * self.size,
            Side::Short => (self.entry_price - current_price) * self.size,
        }
    }

    /// `pnl / (entry * size) * 100`.
    pub fn pnl_pct(&self, current_price: f64) -> f64 {
        let notional = self.entry_price * self.size;
        if notional == 0.0 {
            return 0.0;
        }
        self.pnl(current_price) / notional * 100.0
    }
}

/// In-memory-only tracking for a single open position. Created at entry,
/// discarded at close — never written to the store.
#[derive(Debug, Clone, Copy)]
pub struct PositionMetadata {
    pub highest_profit_pct: f64,
    pub highest_profit_price: f64,
    pub first_profit_time: Option<DateTime<Utc>>,
    pub original_stop_loss: f64,
}

impl PositionMetadata {
    pub fn new_at_entry(entry_price: f64, stop_loss: f64) -> Self {
        Self {
            highest_profit_pct: 0.0,
            highest_profit_price: entry_price,
            first_profit_time: None,
            original_stop_loss: stop_loss,
        }
    }
}

/// Append-only trade row. Two are written per closed position: one at open,
/// one at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub bot_id: String,
    pub position_id: String,
    pub symbol: String,
    pub side: TradeSide,
    /// Base-asset units.
    pub size: f64,
    pub price: f64,
    /// Only set on the closing trade.
    pub pnl: Option<f64>,
    pub executed_at: DateTime<Utc>,
    pub mode: BotMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: Side, entry: f64, size: f64) -> Position {
        Position {
            id: "pos-1".into(),
            bot_id: "bot-1".into(),
            symbol: "BTC".into(),
            side,
            size,
            entry_price: entry,
            current_price: entry,
            stop_loss: 0.0,
            take_profit: 0.0,
            opened_at: Utc::now(),
            closed_at: None,
            status: PositionStatus::Open,
            unrealized_pnl: 0.0,
        }
    }

    #[test]
    fn long_pnl_rises_with_price() {
        let pos = position(Side::Long, 100.0, 2.0);
        assert_eq!(pos.pnl(110.0), 20.0);
        assert_eq!(pos.pnl_pct(110.0), 10.0);
    }

    #[test]
    fn short_pnl_rises_as_price_falls() {
        let pos = position(Side::Short, 100.0, 2.0);
        assert_eq!(pos.pnl(90.0), 20.0);
    }
}
