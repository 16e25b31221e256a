// =============================================================================
// Scanner Worker — periodic top-volume-symbol support/resistance recompute
// =============================================================================
//
// Runs as an independent task, not part of the supervisor loop. Shares no
// in-memory state with any bot instance: it owns its own candle cache and
// writes results only through `scanner_levels` rows.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::levels::{calculate_levels, find_closest_level, Level, LevelType, Timeframe};
use crate::market_data::{CandleCache, MarketDataClient};
use crate::store::scanner_levels::{ClosestLevel, ScannerLevelRow, TimeframeLevels};
use crate::store::ScannerLevelsStore;

/// Scanner cycle period (initial run is immediate).
const CYCLE_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum 24h notional volume for a symbol to be considered.
const MIN_DAY_VOLUME: f64 = 50_000_000.0;

/// Symbols whose 24h change is worse than this are excluded.
const MIN_DAY_CHANGE_PCT: f64 = -10.0;

const TOP_N_SYMBOLS: usize = 10;

const SCANNED_TIMEFRAMES: [(Timeframe, &str, i64); 3] = [
    (Timeframe::M15, "15m", 15 * 60_000),
    (Timeframe::M30, "30m", 30 * 60_000),
    (Timeframe::H1, "1h", 60 * 60_000),
];

/// Closed candles fetched per timeframe for the levels algorithm.
const CANDLES_PER_TIMEFRAME: i64 = 50;

pub struct ScannerWorker {
    market: Arc<MarketDataClient>,
    cache: CandleCache,
    store: ScannerLevelsStore,
    /// Restricts the scanned universe to this set when present, bypassing
    /// the volume/change ranking entirely.
    symbols_override: Option<Vec<String>>,
}

impl ScannerWorker {
    pub fn new(market: Arc<MarketDataClient>, store: ScannerLevelsStore) -> Self {
        Self::with_symbols_override(market, store, None)
    }

    pub fn with_symbols_override(
        market: Arc<MarketDataClient>,
        store: ScannerLevelsStore,
        symbols_override: Option<Vec<String>>,
    ) -> Self {
        let cache = CandleCache::scanner(market.clone());
        Self { market, cache, store, symbols_override }
    }

    /// Runs forever: immediate first pass, then every [`CYCLE_INTERVAL`].
    pub async fn run(self) {
        loop {
            if let Err(e) = self.run_once().await {
                warn!(error = %e, "scanner cycle failed");
            }
            tokio::time::sleep(CYCLE_INTERVAL).await;
        }
    }

    #[instrument(skip(self), name = "scanner::run_once")]
    async fn run_once(&self) -> anyhow::Result<()> {
        let ctxs = self.market.meta_and_asset_ctxs().await?;

        let mut candidates: Vec<(String, f64, f64)> = ctxs
            .into_iter()
            .filter_map(|(symbol, stats)| {
                if stats.day_notional_volume < MIN_DAY_VOLUME {
                    return None;
                }
                if stats.prev_day_price <= 0.0 {
                    return None;
                }
                let change_pct = (stats.mark_price - stats.prev_day_price) / stats.prev_day_price * 100.0;
                if change_pct <= MIN_DAY_CHANGE_PCT {
                    return None;
                }
                Some((symbol, stats.day_notional_volume, stats.mark_price))
            })
            .collect();

        if let Some(allowed) = &self.symbols_override {
            candidates.retain(|(symbol, _, _)| allowed.iter().any(|s| s == symbol));
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        candidates.truncate(TOP_N_SYMBOLS);

        info!(count = candidates.len(), "scanner selected top-volume symbols");

        for (symbol, _volume, mark_price) in candidates {
            if let Err(e) = self.scan_symbol(&symbol, mark_price).await {
                warn!(symbol = %symbol, error = %e, "scanner failed for symbol, continuing");
            }
        }
        Ok(())
    }

    async fn scan_symbol(&self, symbol: &str, current_price: f64) -> anyhow::Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut by_timeframe: HashMap<String, TimeframeLevels> = HashMap::new();
        let mut support_candidates: Vec<Level> = Vec::new();
        let mut resistance_candidates: Vec<Level> = Vec::new();

        for (timeframe, label, span_ms) in SCANNED_TIMEFRAMES {
            let start_ms = now_ms - span_ms * CANDLES_PER_TIMEFRAME;
            let candles = self
                .cache
                .candles(symbol, label, start_ms, now_ms)
                .await?;

            let result = calculate_levels(&candles, current_price, timeframe);
            if let Some(support) = result.support {
                support_candidates.push(support);
            }
            if let Some(resistance) = result.resistance {
                resistance_candidates.push(resistance);
            }
            by_timeframe.insert(
                label.to_string(),
                TimeframeLevels { support: result.support, resistance: result.resistance },
            );
        }

        let strongest_support = find_closest_level(&support_candidates, current_price);
        let strongest_resistance = find_closest_level(&resistance_candidates, current_price);

        let mut all_candidates = support_candidates.clone();
        all_candidates.extend(resistance_candidates.clone());
        let closest_level = find_closest_level(&all_candidates, current_price).map(|level| {
            let is_support = support_candidates.iter().any(|s| s.price == level.price && s.timeframe == level.timeframe);
            ClosestLevel {
                price: level.price,
                timeframe: timeframe_label(level.timeframe).to_string(),
                level_type: if is_support { LevelType::Low } else { LevelType::High },
                distance: (level.price - current_price).abs() / current_price,
                weight: level.weight,
            }
        });

        let row = ScannerLevelRow {
            symbol: symbol.to_string(),
            current_price,
            support: strongest_support,
            resistance: strongest_resistance,
            closest_level,
            all_levels_by_timeframe: by_timeframe,
        };
        self.store.upsert(&row).await
    }
}

fn timeframe_label(tf: Timeframe) -> &'static str {
    SCANNED_TIMEFRAMES
        .iter()
        .find(|(t, _, _)| *t == tf)
        .map(|(_, label, _)| *label)
        .unwrap_or("1h")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_label_resolves_known_timeframes() {
        assert_eq!(timeframe_label(Timeframe::M15), "15m");
        assert_eq!(timeframe_label(Timeframe::H1), "1h");
    }
}
