// =============================================================================
// Levels Algorithm — touch-counting support/resistance zone detection
// =============================================================================
//
// Pure functions over a slice of closed candles; no I/O, no caching. The
// scanner worker is the only caller, once per symbol per timeframe.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

/// Relative distance, as a fraction of the reference price, within which a
/// candle's high/low is considered to touch an existing zone's pivot.
const ZONE_THRESHOLD: f64 = 0.005;

/// Minimum touch count for a zone to be considered a real level.
const MIN_TOUCHES: u32 = 2;

/// Candles examined by the no-zone-qualifies fallback.
const FALLBACK_CANDLE_COUNT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelType {
    Low,
    High,
}

/// A single emitted support or resistance level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub timeframe: Timeframe,
    pub touches: u32,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Weight used to prioritize a level when comparing across timeframes.
    pub fn weight(self) -> u32 {
        match self {
            Timeframe::M5 => 1,
            Timeframe::M15 => 2,
            Timeframe::M30 => 3,
            Timeframe::H1 => 4,
            Timeframe::H4 => 6,
            Timeframe::H12 => 8,
            Timeframe::D1 => 10,
        }
    }
}

struct Zone {
    price: f64,
    touches: u32,
}

/// Output of `calculate_levels` for one timeframe: the closest support (below
/// the reference price) and closest resistance (above it), if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelsResult {
    pub support: Option<Level>,
    pub resistance: Option<Level>,
}

/// Touch-counts `candles`' highs and lows into zones relative to `reference`,
/// then emits the closest qualifying support/resistance pair. Falls back to
/// the true most-recent `FALLBACK_CANDLE_COUNT` closed candles' extremes when
/// no zone reaches `MIN_TOUCHES`.
pub fn calculate_levels(candles: &[Candle], reference: f64, timeframe: Timeframe) -> LevelsResult {
    if candles.is_empty() || reference <= 0.0 {
        return LevelsResult::default();
    }

    let mut zones: Vec<Zone> = Vec::new();
    for candle in candles {
        touch(&mut zones, candle.h, reference);
        touch(&mut zones, candle.l, reference);
    }

    let mut qualified: Vec<&Zone> = zones.iter().filter(|z| z.touches >= MIN_TOUCHES).collect();
    qualified.sort_by(|a, b| b.touches.cmp(&a.touches));

    if qualified.is_empty() {
        return fallback_levels(candles, timeframe);
    }

    let weight = timeframe.weight();
    let support = qualified
        .iter()
        .filter(|z| z.price < reference)
        .max_by(|a, b| a.price.partial_cmp(&b.price).unwrap())
        .map(|z| Level { price: z.price, timeframe, touches: z.touches, weight });
    let resistance = qualified
        .iter()
        .filter(|z| z.price >= reference)
        .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap())
        .map(|z| Level { price: z.price, timeframe, touches: z.touches, weight });

    LevelsResult { support, resistance }
}

fn touch(zones: &mut Vec<Zone>, price: f64, reference: f64) {
    if let Some(zone) = zones.iter_mut().find(|z| (z.price - price).abs() / reference <= ZONE_THRESHOLD) {
        zone.touches += 1;
    } else {
        zones.push(Zone { price, touches: 1 });
    }
}

/// Support/resistance from the extremes of the true most-recent closed
/// candles, used when no zone in `calculate_levels` reaches `MIN_TOUCHES`.
fn fallback_levels(candles: &[Candle], timeframe: Timeframe) -> LevelsResult {
    let recent = &candles[candles.len().saturating_sub(FALLBACK_CANDLE_COUNT)..];
    let weight = timeframe.weight();

    let low = recent.iter().map(|c| c.l).fold(f64::INFINITY, f64::min);
    let high = recent.iter().map(|c| c.h).fold(f64::NEG_INFINITY, f64::max);

    LevelsResult {
        support: Some(Level { price: low, timeframe, touches: 1, weight }),
        resistance: Some(Level { price: high, timeframe, touches: 1, weight }),
    }
}

/// The single closest level among candidates gathered across timeframes,
/// ranked by `(distance_pct ascending, weight descending)`.
pub fn find_closest_level(candidates: &[Level], reference: f64) -> Option<Level> {
    if reference <= 0.0 {
        return None;
    }
    candidates.iter().copied().min_by(|a, b| {
        let da = (a.price - reference).abs() / reference;
        let db = (b.price - reference).abs() / reference;
        da.partial_cmp(&db).unwrap().then_with(|| b.weight.cmp(&a.weight))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64, h: f64, l: f64) -> Candle {
        Candle { t, o: (h + l) / 2.0, h, l, c: (h + l) / 2.0, v: 100.0 }
    }

    #[test]
    fn repeated_touches_form_a_qualifying_zone() {
        let candles = vec![
            candle(0, 105.0, 95.0),
            candle(1, 104.0, 95.1),
            candle(2, 110.0, 99.9),
        ];
        let result = calculate_levels(&candles, 100.0, Timeframe::H1);
        let support = result.support.expect("support should be found");
        assert!((support.price - 95.0).abs() / 95.0 <= ZONE_THRESHOLD);
        assert_eq!(support.touches, 2);
    }

    #[test]
    fn no_qualifying_zone_falls_back_to_recent_extremes() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 100.0 + i as f64, 90.0 - i as f64)).collect();
        let result = calculate_levels(&candles, 95.0, Timeframe::M15);
        assert!(result.support.is_some());
        assert!(result.resistance.is_some());
        assert_eq!(result.support.unwrap().touches, 1);
    }

    #[test]
    fn fallback_uses_at_most_twenty_most_recent_candles() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| candle(i, 100.0, if i < 30 { 1.0 } else { 50.0 }))
            .collect();
        let result = fallback_levels(&candles, Timeframe::D1);
        // The low among the last 20 candles (indices 30..50) is 50.0, not the
        // overall-series low of 1.0 from the stale earlier candles.
        assert_eq!(result.support.unwrap().price, 50.0);
    }

    #[test]
    fn closest_level_prefers_nearer_distance_over_higher_weight() {
        let candidates = vec![
            Level { price: 101.0, timeframe: Timeframe::M5, touches: 2, weight: 1 },
            Level { price: 110.0, timeframe: Timeframe::D1, touches: 2, weight: 10 },
        ];
        let closest = find_closest_level(&candidates, 100.0).unwrap();
        assert_eq!(closest.price, 101.0);
    }

    #[test]
    fn timeframe_weight_table_matches_spec() {
        assert_eq!(Timeframe::M5.weight(), 1);
        assert_eq!(Timeframe::M15.weight(), 2);
        assert_eq!(Timeframe::M30.weight(), 3);
        assert_eq!(Timeframe::H1.weight(), 4);
        assert_eq!(Timeframe::H4.weight(), 6);
        assert_eq!(Timeframe::H12.weight(), 8);
        assert_eq!(Timeframe::D1.weight(), 10);
    }
}
