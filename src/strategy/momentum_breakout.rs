// =============================================================================
// momentum_breakout — §4.G.3
// =============================================================================

use tracing::warn;

use crate::types::Side;

use super::{EntryIntent, StrategyContext, StrategyOutcome};

const LOOKBACK_MINUTES: i64 = 5;
const LONG_THRESHOLD_PCT: f64 = 2.0;
const SHORT_THRESHOLD_PCT: f64 = -2.0;

/// `(current - oldest_close) / oldest_close * 100`.
pub fn momentum_pct(current_price: f64, oldest_close: f64) -> f64 {
    if oldest_close == 0.0 {
        return 0.0;
    }
    (current_price - oldest_close) / oldest_close * 100.0
}

pub async fn run(ctx: &mut StrategyContext<'_>) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();

    for symbol in ctx.symbols.to_vec() {
        if !ctx.entry_allowed(&symbol) {
            continue;
        }
        let Some(current_price) = ctx.mid(&symbol) else { continue };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let start_ms = now_ms - LOOKBACK_MINUTES * 60_000;
        let candles = match ctx.cache.candles(&symbol, "1m", start_ms, now_ms).await {
            Ok(c) => c,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "momentum_breakout: candle fetch failed, skipping");
                continue;
            }
        };
        let Some(oldest) = candles.first() else { continue };

        let momentum = momentum_pct(current_price, oldest.c);
        if momentum > LONG_THRESHOLD_PCT {
            outcome.entries.push(EntryIntent {
                symbol,
                side: Side::Long,
                price: current_price,
                reason: format!("momentum {momentum:.2}% > {LONG_THRESHOLD_PCT}%"),
            });
        } else if momentum < SHORT_THRESHOLD_PCT {
            outcome.entries.push(EntryIntent {
                symbol,
                side: Side::Short,
                price: current_price,
                reason: format!("momentum {momentum:.2}% < {SHORT_THRESHOLD_PCT}%"),
            });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_upward_move_exceeds_long_threshold() {
        assert!(momentum_pct(102.1, 100.0) > LONG_THRESHOLD_PCT);
    }

    #[test]
    fn strong_downward_move_exceeds_short_threshold() {
        assert!(momentum_pct(97.9, 100.0) < SHORT_THRESHOLD_PCT);
    }
}
