// =============================================================================
// support_liquidity — §4.G.6
// =============================================================================
//
// Consumes the scanner's published support level plus net order-flow derived
// from recent trades. Runs at most every 5 seconds per symbol.
// =============================================================================

use std::time::{Duration, Instant};

use tracing::warn;

use crate::market_data::{ExchangeSide, Trade};
use crate::types::Side;

use super::{EntryIntent, StrategyContext, StrategyOutcome};

const CHECK_INTERVAL: Duration = Duration::from_secs(5);
const RECENT_TRADES_LIMIT: usize = 100;
const DISTANCE_THRESHOLD: f64 = 0.0015; // 0.15%
const MIN_PRICE_RATIO: f64 = 0.9985;

#[derive(Debug, Clone, Copy, Default)]
pub struct NetFlow {
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl NetFlow {
    pub fn net(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }

    pub fn ratio(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total == 0.0 {
            return 0.5;
        }
        self.buy_volume / total
    }

    pub fn bullish(&self) -> bool {
        self.net() > 0.0
    }
}

/// `buy = sum(px*sz for side=B)`, `sell = sum(px*sz for side=A)` over the
/// most recent `RECENT_TRADES_LIMIT` trades.
pub fn net_flow(trades: &[Trade]) -> NetFlow {
    let window = &trades[..trades.len().min(RECENT_TRADES_LIMIT)];
    let mut flow = NetFlow::default();
    for trade in window {
        let notional = trade.price * trade.size;
        match trade.side {
            ExchangeSide::B => flow.buy_volume += notional,
            ExchangeSide::A => flow.sell_volume += notional,
        }
    }
    flow
}

pub async fn run(ctx: &mut StrategyContext<'_>) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();
    let Some(scanner_store) = ctx.scanner_store else { return outcome };

    for symbol in ctx.symbols.to_vec() {
        let due = ctx
            .state
            .support_liquidity_last_check
            .get(&symbol)
            .map(|t| t.elapsed() >= CHECK_INTERVAL)
            .unwrap_or(true);
        if !due {
            continue;
        }
        ctx.state.support_liquidity_last_check.insert(symbol.clone(), Instant::now());

        if !ctx.entry_allowed(&symbol) {
            continue;
        }
        let Some(current_price) = ctx.mid(&symbol) else { continue };

        let row = match scanner_store.get(&symbol).await {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "support_liquidity: scanner row fetch failed, skipping");
                continue;
            }
        };
        let Some(support) = row.support else { continue };

        let distance = (current_price - support.price).abs() / support.price;
        if distance > DISTANCE_THRESHOLD {
            continue;
        }
        if current_price < support.price * MIN_PRICE_RATIO {
            continue;
        }

        let trades = match ctx.market.recent_trades(&symbol).await {
            Ok(t) => t,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "support_liquidity: recent_trades fetch failed, skipping");
                continue;
            }
        };
        let flow = net_flow(&trades);
        if !flow.bullish() {
            continue;
        }

        outcome.entries.push(EntryIntent {
            symbol,
            side: Side::Long,
            price: current_price,
            reason: format!("support liquidity bounce near {:.4}, net_flow {:.2}", support.price, flow.net()),
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::ExchangeSide;

    fn trade(price: f64, size: f64, side: ExchangeSide) -> Trade {
        Trade { price, size, side }
    }

    #[test]
    fn bullish_flow_when_buys_dominate() {
        let trades = vec![trade(100.0, 1.0, ExchangeSide::B), trade(100.0, 0.2, ExchangeSide::A)];
        let flow = net_flow(&trades);
        assert!(flow.bullish());
    }

    #[test]
    fn bearish_flow_when_sells_dominate() {
        let trades = vec![trade(100.0, 0.1, ExchangeSide::B), trade(100.0, 1.0, ExchangeSide::A)];
        let flow = net_flow(&trades);
        assert!(!flow.bullish());
    }
}
