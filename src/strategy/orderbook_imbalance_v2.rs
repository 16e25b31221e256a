// =============================================================================
// orderbook_imbalance_v2 — §4.G.2
// =============================================================================
//
// Exits are checked before entries each tick, independent of the generic
// cooldown — cooldown applies only to entries.
// =============================================================================

use std::time::Instant;

use tracing::warn;

use crate::types::Side;

use super::{
    normalize_base_symbol, EntryIntent, OrderbookImbalanceV2Params, StrategyContext, StrategyExit, StrategyOutcome,
    StrategyState,
};

/// ρ = B / (B + A) over `depth` levels.
pub fn imbalance_fraction(bids: &[(f64, f64)], asks: &[(f64, f64)], depth: usize) -> f64 {
    let bid_depth: f64 = bids.iter().take(depth).map(|(_, size)| size).sum();
    let ask_depth: f64 = asks.iter().take(depth).map(|(_, size)| size).sum();
    let total = bid_depth + ask_depth;
    if total == 0.0 {
        return 0.5;
    }
    bid_depth / total
}

pub async fn run(ctx: &mut StrategyContext<'_>, params: &OrderbookImbalanceV2Params) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();

    for raw_symbol in ctx.symbols.to_vec() {
        let symbol = normalize_base_symbol(&raw_symbol);

        let book = match ctx.market.l2_book(&symbol).await {
            Ok(book) => book,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "orderbook_imbalance_v2: l2_book fetch failed, skipping");
                continue;
            }
        };
        let rho = imbalance_fraction(&book.bids, &book.asks, params.depth);

        if let Some(position) = ctx.open_positions.iter().find(|p| p.symbol == symbol && p.side == Side::Long) {
            let opened_at = ctx.state.v2_open_time.entry(symbol.clone()).or_insert_with(Instant::now);
            let held = opened_at.elapsed();

            if held >= params.min_hold_time * 2 {
                outcome.exits.push(StrategyExit {
                    position_id: position.id.clone(),
                    reason: "max hold reached".to_string(),
                });
                continue;
            }
            if held >= params.min_hold_time && rho < (1.0 - params.imbalance_threshold) {
                outcome.exits.push(StrategyExit {
                    position_id: position.id.clone(),
                    reason: "imbalance reversed".to_string(),
                });
            }
            continue;
        }

        if !ctx.entry_allowed(&symbol) {
            continue;
        }
        // Own cooldown, distinct from the generic post-close one: gates
        // re-entry after this strategy's own last trade on the symbol.
        if StrategyState::in_cooldown(&ctx.state.v2_last_trade_time, &symbol, params.cooldown_period) {
            continue;
        }
        if rho > params.imbalance_threshold {
            if let Some(mid) = ctx.mid(&symbol) {
                ctx.state.v2_open_time.insert(symbol.clone(), Instant::now());
                ctx.state.v2_last_trade_time.insert(symbol.clone(), Instant::now());
                outcome.entries.push(EntryIntent {
                    symbol,
                    side: Side::Long,
                    price: mid,
                    reason: format!("orderbook_imbalance_v2 rho {rho:.3} > {:.3}", params.imbalance_threshold),
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
    fn fraction_above_half_means_bid_heavy() {
        let bids = vec![(100.0, 8.0)];
        let asks = vec![(101.0, 2.0)];
        assert!(imbalance_fraction(&bids, &asks, 10) > 0.7);
    }

    #[test]
    fn empty_book_defaults_to_neutral() {
        assert_eq!(imbalance_fraction(&[], &[], 10), 0.5);
    }
}
