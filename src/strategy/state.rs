// =============================================================================
// Per-bot strategy state — timers and wick events owned by one bot instance
// =============================================================================
//
// Nothing here is shared across bots. A bot owns exactly one `StrategyState`
// for the lifetime of its strategy assignment.
// =============================================================================

use std::collections::HashMap;
use std::time::Instant;

use crate::levels::Timeframe;

/// Recorded when `liquidity_grab` sees price dip to within its wick
/// threshold of a candidate support level; cleared on timeout or trigger.
#[derive(Debug, Clone, Copy)]
pub struct WickEvent {
    pub support_price: f64,
    pub timeframe: Timeframe,
    pub wick_price: f64,
    pub wick_time: Instant,
}

#[derive(Default)]
pub struct StrategyState {
    /// orderbook_imbalance_v2: symbol → time the long was opened.
    pub v2_open_time: HashMap<String, Instant>,
    /// orderbook_imbalance_v2: symbol → time of the most recent entry check.
    pub v2_last_trade_time: HashMap<String, Instant>,
    /// liquidity_grab: symbol → current wick event, if armed.
    pub wick_events: HashMap<String, WickEvent>,
    /// liquidity_grab: symbol → last time this symbol was evaluated (5s throttle).
    pub liquidity_grab_last_check: HashMap<String, Instant>,
    /// support_liquidity: symbol → last time this symbol was evaluated (5s throttle).
    pub support_liquidity_last_check: HashMap<String, Instant>,
    /// multi_timeframe_breakout: symbol → last market_metrics tile refresh (30s throttle).
    pub mtf_last_market_metrics_log: HashMap<String, Instant>,
    /// multi_timeframe_breakout: symbol → last monitoring tile refresh (5s throttle).
    pub mtf_last_monitoring_log: HashMap<String, Instant>,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared across strategies/Position Manager: whether `symbol` is still
    /// inside its post-close cooldown window.
    pub fn in_cooldown(last_close: &HashMap<String, Instant>, symbol: &str, cooldown: std::time::Duration) -> bool {
        last_close
            .get(symbol)
            .map(|t| t.elapsed() < cooldown)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_symbol_is_not_in_cooldown() {
        let last_close = HashMap::new();
        assert!(!StrategyState::in_cooldown(&last_close, "BTC", Duration::from_secs(60)));
    }

    #[test]
    fn recent_close_is_in_cooldown() {
        let mut last_close = HashMap::new();
        last_close.insert("BTC".to_string(), Instant::now());
        assert!(StrategyState::in_cooldown(&last_close, "BTC", Duration::from_secs(60)));
    }
}
