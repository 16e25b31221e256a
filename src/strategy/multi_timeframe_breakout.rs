// =============================================================================
// multi_timeframe_breakout (dip-only variant) — §4.G.4
// =============================================================================
//
// Highs are computed for observability but never fire entries (disabled by
// design for risk reduction). Momentum score is logged, never filtered on.
// =============================================================================

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::warn;

use crate::market_data::Candle;
use crate::types::{Side, TileKind};

use super::{EntryIntent, MultiTimeframeBreakoutParams, StrategyContext, StrategyOutcome};

const NEAR_LOW_WIGGLE: f64 = 0.0005;
const MARKET_METRICS_INTERVAL: Duration = Duration::from_secs(30);
const MONITORING_INTERVAL: Duration = Duration::from_secs(5);

struct TimeframeSnapshot {
    high: f64,
    low: f64,
    avg_volume: f64,
}

async fn fetch_snapshot(
    ctx: &StrategyContext<'_>,
    symbol: &str,
    interval: &str,
    span_ms: i64,
) -> anyhow::Result<TimeframeSnapshot> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let candles = ctx.cache.candles(symbol, interval, now_ms - span_ms, now_ms).await?;
    last_closed_snapshot(&candles)
}

fn last_closed_snapshot(candles: &[Candle]) -> anyhow::Result<TimeframeSnapshot> {
    let closed = &candles[..candles.len().saturating_sub(1).min(candles.len())];
    let last = closed.last().or_else(|| candles.last()).ok_or_else(|| anyhow::anyhow!("no candles"))?;
    let avg_volume = if closed.is_empty() {
        last.v
    } else {
        closed.iter().map(|c| c.v).sum::<f64>() / closed.len() as f64
    };
    Ok(TimeframeSnapshot { high: last.h, low: last.l, avg_volume })
}

/// `clamp(V_15m / V_30m, 0.5, 3.0)`.
pub fn volume_weight(v15: f64, v30: f64) -> f64 {
    if v30 == 0.0 {
        return 0.5;
    }
    (v15 / v30).clamp(0.5, 3.0)
}

/// `current <= low && |current - low| / low <= wiggle`.
pub fn near_low(current: f64, low: f64, wiggle: f64) -> bool {
    low > 0.0 && current <= low && (current - low).abs() / low <= wiggle
}

/// Observable-only metric, never used to gate entries (§9).
pub fn momentum_score(current: f64, reference_low: f64) -> f64 {
    if reference_low == 0.0 {
        return 0.0;
    }
    (current - reference_low) / reference_low * 100.0
}

pub async fn run(ctx: &mut StrategyContext<'_>, params: &MultiTimeframeBreakoutParams) -> StrategyOutcome {
    let mut outcome = StrategyOutcome::default();

    for symbol in ctx.symbols.to_vec() {
        let Some(current_price) = ctx.mid(&symbol) else { continue };

        let h1 = fetch_snapshot(ctx, &symbol, "1h", 24 * 60 * 60_000).await;
        let m30 = fetch_snapshot(ctx, &symbol, "30m", 12 * 60 * 60_000).await;
        let m15 = fetch_snapshot(ctx, &symbol, "15m", 6 * 60 * 60_000).await;

        let (h1, m30, m15) = match (h1, m30, m15) {
            (Ok(a), Ok(b), Ok(c)) => (a, b, c),
            _ => {
                warn!(symbol = %symbol, "multi_timeframe_breakout: candle fetch failed, skipping");
                continue;
            }
        };

        let trend_bearish = match trend_filter(ctx, &symbol).await {
            Ok(bearish) => bearish,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, fail_open = params.fail_open_on_trend_error, "trend filter errored");
                !params.fail_open_on_trend_error
            }
        };

        let w = volume_weight(m15.avg_volume, m30.avg_volume);
        let has_volume = w > 0.5;
        let near_low_1h = near_low(current_price, h1.low, NEAR_LOW_WIGGLE);
        let near_low_30m = near_low(current_price, m30.low, NEAR_LOW_WIGGLE);
        let near_low_15m = near_low(current_price, m15.low, NEAR_LOW_WIGGLE);
        let score = momentum_score(current_price, h1.low);

        if ctx.state.mtf_last_market_metrics_log.get(&symbol).map(|t| t.elapsed() >= MARKET_METRICS_INTERVAL).unwrap_or(true) {
            ctx.logs
                .update_tile(
                    TileKind::MarketMetrics,
                    &symbol,
                    "multi_timeframe_breakout metrics",
                    json!({
                        "volume_weight": w,
                        "momentum_score": score,
                        "trend_bearish": trend_bearish,
                        "h1_low": h1.low,
                        "m30_low": m30.low,
                        "m15_low": m15.low,
                    }),
                )
                .await;
            ctx.state.mtf_last_market_metrics_log.insert(symbol.clone(), Instant::now());
        }

        if !ctx.entry_allowed(&symbol) {
            if ctx.state.mtf_last_monitoring_log.get(&symbol).map(|t| t.elapsed() >= MONITORING_INTERVAL).unwrap_or(true) {
                ctx.logs
                    .update_tile(TileKind::Monitoring, &symbol, "monitoring (entry suppressed)", json!({"price": current_price}))
                    .await;
                ctx.state.mtf_last_monitoring_log.insert(symbol.clone(), Instant::now());
            }
            continue;
        }

        if trend_bearish {
            continue;
        }

        let (fires, reason) = if near_low_1h && has_volume {
            (true, "Buy dip at 1h low")
        } else if near_low_30m && has_volume {
            (true, "Buy dip at 30m low")
        } else if near_low_15m && has_volume {
            (true, "Buy dip at 15m low")
        } else {
            (false, "")
        };

        if fires {
            outcome.entries.push(EntryIntent {
                symbol,
                side: Side::Long,
                price: current_price,
                reason: reason.to_string(),
            });
        } else if ctx.state.mtf_last_monitoring_log.get(&symbol).map(|t| t.elapsed() >= MONITORING_INTERVAL).unwrap_or(true) {
            ctx.logs
                .update_tile(TileKind::Monitoring, &symbol, "monitoring", json!({"price": current_price}))
                .await;
            ctx.state.mtf_last_monitoring_log.insert(symbol.clone(), Instant::now());
        }
    }

    outcome
}

async fn trend_filter(ctx: &StrategyContext<'_>, symbol: &str) -> anyhow::Result<bool> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let candles = ctx.cache.candles(symbol, "1h", now_ms - 6 * 60 * 60_000, now_ms).await?;
    let last_closed = &candles[..candles.len().saturating_sub(1).min(candles.len())];
    let last = last_closed.last().or_else(|| candles.last()).ok_or_else(|| anyhow::anyhow!("no 1h candles"))?;
    Ok(last.c < last.o)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_weight_is_clamped() {
        assert_eq!(volume_weight(10.0, 1.0), 3.0);
        assert_eq!(volume_weight(0.1, 10.0), 0.5);
    }

    #[test]
    fn near_low_matches_literal_spec_scenario() {
        // current 167.95, low 168.00 -> 2.98e-4 <= 5e-4, and current <= low
        assert!(near_low(167.95, 168.00, NEAR_LOW_WIGGLE));
    }

    #[test]
    fn not_near_low_when_beyond_wiggle() {
        assert!(!near_low(169.0, 168.00, NEAR_LOW_WIGGLE));
    }
}
