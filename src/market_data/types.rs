// =============================================================================
// Market data DTOs and the string→float parsing boundary
// =============================================================================
//
// The exchange returns every numeric field as a JSON string. We deserialize
// the wire shape with `String` fields, then parse to `f64` exactly once, at
// the edge, so nothing downstream of the market data client ever sees an
// untyped or stringly-typed value.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Parse a provider-supplied numeric string into an `f64`. Returns `0.0` on
/// malformed input rather than failing the whole response — a single bad
/// field should not take down an otherwise-usable snapshot.
pub fn parse_str_f64(raw: &str) -> f64 {
    raw.parse().unwrap_or(0.0)
}

/// One closed or in-progress candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, epoch milliseconds.
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCandle {
    pub t: i64,
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
    pub v: String,
}

impl From<RawCandle> for Candle {
    fn from(raw: RawCandle) -> Self {
        Self {
            t: raw.t,
            o: parse_str_f64(&raw.o),
            h: parse_str_f64(&raw.h),
            l: parse_str_f64(&raw.l),
            c: parse_str_f64(&raw.c),
            v: parse_str_f64(&raw.v),
        }
    }
}

/// Which side initiated a trade: bid-initiated (buy) or ask-initiated (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeSide {
    /// Bid — buyer-initiated.
    B,
    /// Ask — seller-initiated.
    A,
}

/// A single recent trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub side: ExchangeSide,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTrade {
    pub px: String,
    pub sz: String,
    pub side: ExchangeSide,
}

impl From<RawTrade> for Trade {
    fn from(raw: RawTrade) -> Self {
        Self {
            price: parse_str_f64(&raw.px),
            size: parse_str_f64(&raw.sz),
            side: raw.side,
        }
    }
}

/// One price level: `(price, size)`.
pub type Level = (f64, f64);

/// An L2 order book snapshot: bids and asks, each ordered best-first.
#[derive(Debug, Clone, Default)]
pub struct L2Book {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawL2BookResponse {
    #[allow(dead_code)]
    pub coin: String,
    pub levels: Vec<Vec<[String; 2]>>,
}

impl From<RawL2BookResponse> for L2Book {
    fn from(raw: RawL2BookResponse) -> Self {
        let parse_side = |levels: &[[String; 2]]| -> Vec<Level> {
            levels
                .iter()
                .map(|[price, size]| (parse_str_f64(price), parse_str_f64(size)))
                .collect()
        };
        let bids = raw.levels.first().map(|v| parse_side(v)).unwrap_or_default();
        let asks = raw.levels.get(1).map(|v| parse_side(v)).unwrap_or_default();
        Self { bids, asks }
    }
}

/// Per-symbol 24h stats used by the scanner's top-volume-token filter.
#[derive(Debug, Clone, Copy)]
pub struct AssetVolumeStats {
    pub day_notional_volume: f64,
    pub prev_day_price: f64,
    pub mark_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawUniverseAsset {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawMeta {
    pub universe: Vec<RawUniverseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAssetCtx {
    #[serde(rename = "dayNtlVlm")]
    pub day_ntl_vlm: String,
    #[serde(rename = "prevDayPx")]
    pub prev_day_px: String,
    #[serde(rename = "markPx")]
    pub mark_px: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_str_f64_handles_malformed_input() {
        assert_eq!(parse_str_f64("1.5"), 1.5);
        assert_eq!(parse_str_f64("not-a-number"), 0.0);
    }

    #[test]
    fn l2_book_from_raw_orders_bids_then_asks() {
        let raw = RawL2BookResponse {
            coin: "BTC".into(),
            levels: vec![
                vec![["100.0".into(), "1.0".into()], ["99.0".into(), "2.0".into()]],
                vec![["101.0".into(), "1.5".into()]],
            ],
        };
        let book: L2Book = raw.into();
        assert_eq!(book.bids, vec![(100.0, 1.0), (99.0, 2.0)]);
        assert_eq!(book.asks, vec![(101.0, 1.5)]);
    }

    #[test]
    fn candle_from_raw_parses_every_numeric_field() {
        let raw = RawCandle {
            t: 1000,
            o: "10".into(),
            h: "12".into(),
            l: "9".into(),
            c: "11".into(),
            v: "100".into(),
        };
        let candle: Candle = raw.into();
        assert_eq!(candle, Candle { t: 1000, o: 10.0, h: 12.0, l: 9.0, c: 11.0, v: 100.0 });
    }
}
