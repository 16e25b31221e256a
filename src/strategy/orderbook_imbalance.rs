// =============================================================================
// orderbook_imbalance (v1) — §4.G.1
// =============================================================================

use tracing::warn;

use crate::types::Side;

use super::{EntryIntent, StrategyContext, StrategyOutcome};

const DEPTH: usize = 10;
const LONG_RATIO: f64 = 3.0;
const SHORT_RATIO: f64 = 0.33;

/// Sum of size over the top `DEPTH` levels on bids and asks, and their ratio.
pub fn imbalance_ratio(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> f64 {
    let bid_depth: f64 = bids.iter().take(DEPTH).map(|(_, size)| size).sum();
    let ask_depth: f64 = asks.iter().take(DEPTH).map(|(_, size)| size).sum();
    if ask_depth == 0.0 {
        return f64::INFINITY;
    }
    bid_depth / ask_depth
}

pub async fn run(ctx: &mut StrategyContext<'_>) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();

    for symbol in ctx.symbols.to_vec() {
        if !ctx.entry_allowed(&symbol) {
            continue;
        }

        let book = match ctx.market.l2_book(&symbol).await {
            Ok(book) => book,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "orderbook_imbalance: l2_book fetch failed, skipping");
                continue;
            }
        };

        let ratio = imbalance_ratio(&book.bids, &book.asks);
        if ratio > LONG_RATIO {
            if let Some(best_ask) = book.asks.first() {
                outcome.entries.push(EntryIntent {
                    symbol: symbol.clone(),
                    side: Side::Long,
                    price: best_ask.0,
                    reason: format!("orderbook imbalance ratio {ratio:.2} > {LONG_RATIO}"),
                });
            }
        } else if ratio < SHORT_RATIO {
            if let Some(best_bid) = book.bids.first() {
                outcome.entries.push(EntryIntent {
                    symbol: symbol.clone(),
                    side: Side::Short,
                    price: best_bid.0,
                    reason: format!("orderbook imbalance ratio {ratio:.2} < {SHORT_RATIO}"),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_above_threshold_favors_long() {
        let bids = vec![(100.0, 30.0)];
        let asks = vec![(101.0, 8.0)];
        let ratio = imbalance_ratio(&bids, &asks);
        assert!(ratio > LONG_RATIO);
    }

    #[test]
    fn ratio_below_threshold_favors_short() {
        let bids = vec![(100.0, 2.0)];
        let asks = vec![(101.0, 20.0)];
        let ratio = imbalance_ratio(&bids, &asks);
        assert!(ratio < SHORT_RATIO);
    }
}
