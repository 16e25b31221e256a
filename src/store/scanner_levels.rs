// =============================================================================
// Scanner Levels Store — one row per symbol, written by the scanner worker,
// read by the support_liquidity strategy
// =============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::levels::{Level, LevelType};

use super::client::StoreClient;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClosestLevel {
    pub price: f64,
    pub timeframe: String,
    #[serde(rename = "type")]
    pub level_type: LevelType,
    pub distance: f64,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerLevelRow {
    pub symbol: String,
    pub current_price: f64,
    pub support: Option<Level>,
    pub resistance: Option<Level>,
    pub closest_level: Option<ClosestLevel>,
    pub all_levels_by_timeframe: HashMap<String, TimeframeLevels>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeframeLevels {
    pub support: Option<Level>,
    pub resistance: Option<Level>,
}

#[derive(Clone)]
pub struct ScannerLevelsStore {
    store: StoreClient,
}

impl ScannerLevelsStore {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Upserts one row keyed by symbol, overwriting any prior row for it.
    #[instrument(skip(self, row), name = "store::upsert_scanner_level")]
    pub async fn upsert(&self, row: &ScannerLevelRow) -> Result<()> {
        let mut body = serde_json::to_value(row).context("failed to serialize scanner level row")?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("updated_at".to_string(), serde_json::json!(chrono::Utc::now().to_rfc3339()));
        }
        self.store
            .upsert("scanner_levels", "symbol", &body)
            .await
            .context("failed to upsert scanner level row")
    }

    /// Reads the current row for `symbol`, if the scanner has published one.
    #[instrument(skip(self), name = "store::get_scanner_level")]
    pub async fn get(&self, symbol: &str) -> Result<Option<ScannerLevelRow>> {
        let rows = self
            .store
            .select("scanner_levels", &format!("symbol=eq.{symbol}"))
            .await
            .context("failed to fetch scanner level row")?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(
                serde_json::from_value(row).context("failed to decode scanner level row")?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Timeframe;

    #[test]
    fn row_round_trips_through_json() {
        let mut all = HashMap::new();
        all.insert(
            "1h".to_string(),
            TimeframeLevels {
                support: Some(Level { price: 99.0, timeframe: Timeframe::H1, touches: 3, weight: 4 }),
                resistance: None,
            },
        );
        let row = ScannerLevelRow {
            symbol: "BTC".into(),
            current_price: 100.0,
            support: Some(Level { price: 99.0, timeframe: Timeframe::H1, touches: 3, weight: 4 }),
            resistance: None,
            closest_level: None,
            all_levels_by_timeframe: all,
        };
        let value = serde_json::to_value(&row).unwrap();
        let decoded: ScannerLevelRow = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.symbol, "BTC");
    }
}
