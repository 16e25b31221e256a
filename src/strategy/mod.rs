// =============================================================================
// Strategy Evaluators — closed sum-type dispatch over five decision procedures
// =============================================================================
//
// A bot is assigned exactly one `StrategyKind` for its lifetime (read from
// its `strategies` row). Each variant carries its own typed parameters —
// no untyped option bag reaches the evaluator at runtime.
// =============================================================================

pub mod liquidity_grab;
pub mod momentum_breakout;
pub mod multi_timeframe_breakout;
pub mod orderbook_imbalance;
pub mod orderbook_imbalance_v2;
pub mod state;
pub mod support_liquidity;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::levels::{Level, Timeframe};
use crate::market_data::{CandleCache, MarketDataClient};
use crate::position::Position;
use crate::store::{ScannerLevelsStore, StoreLogClient};
use crate::store::bots::StrategyRow;
use crate::types::Side;

pub use state::StrategyState;

/// Generic per-symbol cooldown after a position closes, shared by every
/// strategy's entry preamble.
pub const ENTRY_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct EntryIntent {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct StrategyExit {
    pub position_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub entries: Vec<EntryIntent>,
    pub exits: Vec<StrategyExit>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderbookImbalanceV2Params {
    pub imbalance_threshold: f64,
    pub depth: usize,
    pub min_hold_time: Duration,
    pub cooldown_period: Duration,
}

impl Default for OrderbookImbalanceV2Params {
    fn default() -> Self {
        Self {
            imbalance_threshold: 0.7,
            depth: 10,
            min_hold_time: Duration::from_secs(30),
            cooldown_period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MultiTimeframeBreakoutParams {
    /// Whether a trend-filter fetch error permits (rather than blocks) entries.
    /// Documents the source's fail-open behavior explicitly (§9).
    pub fail_open_on_trend_error: bool,
}

impl Default for MultiTimeframeBreakoutParams {
    fn default() -> Self {
        Self { fail_open_on_trend_error: true }
    }
}

/// Closed sum type over the five decision procedures plus the default no-op.
#[derive(Debug, Clone)]
pub enum StrategyKind {
    OrderbookImbalance,
    OrderbookImbalanceV2(OrderbookImbalanceV2Params),
    MomentumBreakout,
    MultiTimeframeBreakout(MultiTimeframeBreakoutParams),
    LiquidityGrab,
    SupportLiquidity,
    Default,
}

impl StrategyKind {
    /// Parses a strategy row's `type` string and `parameters` JSON into a
    /// typed variant. Unrecognized parameter fields fall back to defaults
    /// rather than failing — this mirrors the store being the schema's
    /// source of truth, not the engine.
    pub fn from_row(row: &StrategyRow) -> Self {
        match row.strategy_type.as_str() {
            "orderbook_imbalance" => StrategyKind::OrderbookImbalance,
            "orderbook_imbalance_v2" => {
                let p = &row.parameters;
                StrategyKind::OrderbookImbalanceV2(OrderbookImbalanceV2Params {
                    imbalance_threshold: p.get("imbalance_threshold").and_then(|v| v.as_f64()).unwrap_or(0.7),
                    depth: p.get("depth").and_then(|v| v.as_u64()).unwrap_or(10) as usize,
                    min_hold_time: Duration::from_secs(p.get("min_hold_time").and_then(|v| v.as_u64()).unwrap_or(30)),
                    cooldown_period: Duration::from_secs(p.get("cooldown_period").and_then(|v| v.as_u64()).unwrap_or(60)),
                })
            }
            "momentum_breakout" => StrategyKind::MomentumBreakout,
            "multi_timeframe_breakout" => {
                let p = &row.parameters;
                StrategyKind::MultiTimeframeBreakout(MultiTimeframeBreakoutParams {
                    fail_open_on_trend_error: p
                        .get("fail_open_on_trend_error")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(true),
                })
            }
            "liquidity_grab" => StrategyKind::LiquidityGrab,
            "support_liquidity" => StrategyKind::SupportLiquidity,
            _ => StrategyKind::Default,
        }
    }
}

/// Shared handles and per-tick snapshots passed into every strategy's `run`.
pub struct StrategyContext<'a> {
    pub symbols: &'a [String],
    pub market: &'a MarketDataClient,
    pub cache: &'a CandleCache,
    pub mids: &'a HashMap<String, f64>,
    pub open_positions: &'a [Position],
    pub max_positions: usize,
    pub last_close_time: &'a HashMap<String, Instant>,
    pub logs: &'a StoreLogClient,
    pub scanner_store: Option<&'a ScannerLevelsStore>,
    pub state: &'a mut StrategyState,
}

impl<'a> StrategyContext<'a> {
    fn has_open_position(&self, symbol: &str) -> bool {
        self.open_positions.iter().any(|p| p.symbol == symbol)
    }

    fn at_max_positions(&self) -> bool {
        self.open_positions.len() >= self.max_positions
    }

    fn in_cooldown(&self, symbol: &str) -> bool {
        StrategyState::in_cooldown(self.last_close_time, symbol, ENTRY_COOLDOWN)
    }

    /// Common preamble (§4.G): entries are suppressed when the symbol
    /// already has an open position, the bot is at its position cap, or the
    /// symbol is still inside its post-close cooldown. Observational logging
    /// continues regardless.
    fn entry_allowed(&self, symbol: &str) -> bool {
        !self.has_open_position(symbol) && !self.at_max_positions() && !self.in_cooldown(symbol)
    }

    fn mid(&self, symbol: &str) -> Option<f64> {
        self.mids.get(symbol).copied()
    }
}

/// Dispatches to the evaluator named by `kind`, running it over every symbol
/// in `ctx.symbols`.
pub async fn evaluate(kind: &StrategyKind, ctx: &mut StrategyContext<'_>) -> StrategyOutcome {
    match kind {
        StrategyKind::OrderbookImbalance => orderbook_imbalance::run(ctx).await,
        StrategyKind::OrderbookImbalanceV2(params) => orderbook_imbalance_v2::run(ctx, params).await,
        StrategyKind::MomentumBreakout => momentum_breakout::run(ctx).await,
        StrategyKind::MultiTimeframeBreakout(params) => multi_timeframe_breakout::run(ctx, params).await,
        StrategyKind::LiquidityGrab => liquidity_grab::run(ctx).await,
        StrategyKind::SupportLiquidity => support_liquidity::run(ctx).await,
        StrategyKind::Default => StrategyOutcome::default(),
    }
}

/// Normalizes a symbol to its upper-case base asset by stripping common
/// quote-currency suffixes (used by orderbook_imbalance_v2, §4.G.2).
pub fn normalize_base_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    upper
        .strip_suffix("USDT")
        .or_else(|| upper.strip_suffix("USD"))
        .unwrap_or(&upper)
        .to_string()
}

/// Weighted-timeframe level pick shared by strategies that compare a single
/// timeframe's support level against the current price (liquidity_grab).
pub fn nearest_below(levels: &[Level], reference: f64) -> Option<Level> {
    levels
        .iter()
        .copied()
        .filter(|l| l.price < reference)
        .max_by(|a, b| a.price.partial_cmp(&b.price).unwrap())
}

pub fn prefer_timeframe(a: Option<Level>, b: Option<Level>, preferred: Timeframe) -> Option<Level> {
    match (a, b) {
        (Some(x), _) if x.timeframe == preferred => Some(x),
        (_, Some(y)) if y.timeframe == preferred => Some(y),
        (Some(x), _) => Some(x),
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_usdt_and_usd_suffixes() {
        assert_eq!(normalize_base_symbol("btcusdt"), "BTC");
        assert_eq!(normalize_base_symbol("ETHUSD"), "ETH");
        assert_eq!(normalize_base_symbol("SOL"), "SOL");
    }
}
