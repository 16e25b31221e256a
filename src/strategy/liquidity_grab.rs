// =============================================================================
// liquidity_grab — §4.G.5
// =============================================================================
//
// A wick-and-bounce state machine per symbol: Idle -> Armed -> (fires | times
// out back to Idle).
// =============================================================================

use std::time::{Duration, Instant};

use tracing::warn;

use crate::levels::Timeframe;
use crate::types::Side;

use super::state::WickEvent;
use super::{prefer_timeframe, EntryIntent, StrategyContext, StrategyOutcome};

const CHECK_INTERVAL: Duration = Duration::from_secs(5);
const ARM_THRESHOLD: f64 = 0.001; // within 0.1% of support
const BOUNCE_THRESHOLD: f64 = 0.002; // back to within 0.2% of support
const WICK_TIMEOUT: Duration = Duration::from_secs(600);
const VOLUME_RATIO_TRIGGER: f64 = 0.8;
const RECOVERY_PCT_TRIGGER: f64 = 0.1;

pub async fn run(ctx: &mut StrategyContext<'_>) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();

    for symbol in ctx.symbols.to_vec() {
        let due = ctx
            .state
            .liquidity_grab_last_check
            .get(&symbol)
            .map(|t| t.elapsed() >= CHECK_INTERVAL)
            .unwrap_or(true);
        if !due {
            continue;
        }
        ctx.state.liquidity_grab_last_check.insert(symbol.clone(), Instant::now());

        let Some(current_price) = ctx.mid(&symbol) else { continue };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let h1 = ctx.cache.candles(&symbol, "1h", now_ms - 6 * 60 * 60_000, now_ms).await;
        let m30 = ctx.cache.candles(&symbol, "30m", now_ms - 3 * 60 * 60_000, now_ms).await;
        let m15 = ctx.cache.candles(&symbol, "15m", now_ms - 90 * 60_000, now_ms).await;

        let (h1, m30, m15) = match (h1, m30, m15) {
            (Ok(a), Ok(b), Ok(c)) => (a, b, c),
            _ => {
                warn!(symbol = %symbol, "liquidity_grab: candle fetch failed, skipping");
                continue;
            }
        };
        let Some(last_30m) = m30.last() else { continue };
        if last_30m.c < last_30m.o {
            continue; // 30m trend filter: bearish, skip
        }
        let Some(last_h1) = h1.last() else { continue };
        let Some(last_15m) = m15.last() else { continue };

        let s_1h = super::Level { price: last_h1.l, timeframe: Timeframe::H1, touches: 1, weight: Timeframe::H1.weight() };
        let s_30m = super::Level { price: last_30m.l, timeframe: Timeframe::M30, touches: 1, weight: Timeframe::M30.weight() };
        let candidate = prefer_timeframe(Some(s_1h), Some(s_30m), Timeframe::H1);
        let Some(support) = candidate else { continue };

        let v_avg = if support.timeframe == Timeframe::H1 {
            h1.iter().map(|c| c.v).sum::<f64>() / h1.len().max(1) as f64
        } else {
            m30.iter().map(|c| c.v).sum::<f64>() / m30.len().max(1) as f64
        };
        let v_now = last_15m.v;

        if !ctx.entry_allowed(&symbol) {
            continue;
        }

        match ctx.state.wick_events.get(&symbol).copied() {
            None => {
                if current_price <= support.price * (1.0 + ARM_THRESHOLD) {
                    ctx.state.wick_events.insert(
                        symbol.clone(),
                        WickEvent {
                            support_price: support.price,
                            timeframe: support.timeframe,
                            wick_price: current_price,
                            wick_time: Instant::now(),
                        },
                    );
                }
            }
            Some(wick) => {
                if wick.wick_time.elapsed() > WICK_TIMEOUT {
                    ctx.state.wick_events.remove(&symbol);
                    continue;
                }
                let bounced = current_price >= wick.support_price * (1.0 - BOUNCE_THRESHOLD);
                let volume_ratio = if v_avg > 0.0 { v_now / v_avg } else { 0.0 };
                let recovery_pct = if wick.wick_price != 0.0 {
                    (current_price - wick.wick_price) / wick.wick_price * 100.0
                } else {
                    0.0
                };
                if bounced && (volume_ratio >= VOLUME_RATIO_TRIGGER || recovery_pct >= RECOVERY_PCT_TRIGGER) {
                    outcome.entries.push(EntryIntent {
                        symbol: symbol.clone(),
                        side: Side::Long,
                        price: current_price,
                        reason: format!(
                            "liquidity grab bounce off {:?} support {:.4}",
                            wick.timeframe, wick.support_price
                        ),
                    });
                    ctx.state.wick_events.remove(&symbol);
                }
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_threshold_matches_scenario_five() {
        let support = 100.0;
        let current = 99.95;
        assert!(current <= support * (1.0 + ARM_THRESHOLD));
    }

    #[test]
    fn bounce_threshold_matches_scenario_five() {
        let support = 100.0;
        let current = 100.05;
        assert!(current >= support * (1.0 - BOUNCE_THRESHOLD));
    }
}
