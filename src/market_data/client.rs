// =============================================================================
// Market Data Client — rate-limited fetchers over the exchange's HTTP API
// =============================================================================
//
// The exchange exposes a single POST JSON endpoint that dispatches on a
// `type` field (`"allMids"`, `"l2Book"`, `"candleSnapshot"`, `"recentTrades"`,
// `"metaAndAssetCtxs"`). None of these calls retry internally — a caller that
// wants resilience wraps them (the candle cache does, for `candles`).
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::instrument;

use super::types::{
    parse_str_f64, AssetVolumeStats, Candle, L2Book, RawAssetCtx, RawCandle, RawL2BookResponse,
    RawMeta, RawTrade, Trade,
};

/// Client-side timeout for every market-data HTTP call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Ambient delay before every order-book fetch, to stay polite to the
/// provider's rate limit.
const L2_FETCH_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone)]
pub struct MarketDataClient {
    base_url: String,
    client: reqwest::Client,
}

impl MarketDataClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build market data HTTP client");
        Self { base_url: base_url.into(), client }
    }

    async fn post(&self, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .context("market data request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("market data request returned HTTP {}", response.status());
        }
        Ok(response)
    }

    /// Mid price for every tradable symbol.
    #[instrument(skip(self), name = "market_data::all_mids")]
    pub async fn all_mids(&self) -> Result<HashMap<String, f64>> {
        let response = self.post(json!({ "type": "allMids" })).await?;
        let raw: HashMap<String, String> = response
            .json()
            .await
            .context("failed to decode allMids response")?;
        Ok(raw
            .into_iter()
            .map(|(symbol, price)| (symbol, parse_str_f64(&price)))
            .collect())
    }

    /// Ordered L2 order book for one symbol, best level first on each side.
    #[instrument(skip(self), name = "market_data::l2_book")]
    pub async fn l2_book(&self, symbol: &str) -> Result<L2Book> {
        tokio::time::sleep(L2_FETCH_DELAY).await;
        let response = self
            .post(json!({ "type": "l2Book", "coin": symbol }))
            .await?;
        let raw: RawL2BookResponse = response
            .json()
            .await
            .context("failed to decode l2Book response")?;
        Ok(raw.into())
    }

    /// Closed + in-progress candles for one symbol/interval in `[start_ms, end_ms)`.
    /// Callers needing repeat calls over rolling windows should go through the
    /// candle cache rather than calling this directly.
    #[instrument(skip(self), name = "market_data::candles")]
    pub async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        let response = self
            .post(json!({
                "type": "candleSnapshot",
                "req": {
                    "coin": symbol,
                    "interval": interval,
                    "startTime": start_ms,
                    "endTime": end_ms,
                }
            }))
            .await?;
        let raw: Vec<RawCandle> = response
            .json()
            .await
            .context("failed to decode candleSnapshot response")?;
        Ok(raw.into_iter().map(Candle::from).collect())
    }

    /// Up to the most recent trades for one symbol.
    #[instrument(skip(self), name = "market_data::recent_trades")]
    pub async fn recent_trades(&self, symbol: &str) -> Result<Vec<Trade>> {
        let response = self
            .post(json!({ "type": "recentTrades", "coin": symbol }))
            .await?;
        let raw: Vec<RawTrade> = response
            .json()
            .await
            .context("failed to decode recentTrades response")?;
        Ok(raw.into_iter().map(Trade::from).collect())
    }

    /// 24h notional volume, previous-day price, and mark price for every
    /// symbol in the exchange's universe. Used by the scanner's top-volume
    /// filter (§4.D).
    #[instrument(skip(self), name = "market_data::meta_and_asset_ctxs")]
    pub async fn meta_and_asset_ctxs(&self) -> Result<HashMap<String, AssetVolumeStats>> {
        let response = self.post(json!({ "type": "metaAndAssetCtxs" })).await?;
        let raw: (RawMeta, Vec<RawAssetCtx>) = response
            .json()
            .await
            .context("failed to decode metaAndAssetCtxs response")?;
        let (meta, ctxs) = raw;

        Ok(meta
            .universe
            .into_iter()
            .zip(ctxs)
            .map(|(asset, ctx)| {
                (
                    asset.name,
                    AssetVolumeStats {
                        day_notional_volume: parse_str_f64(&ctx.day_ntl_vlm),
                        prev_day_price: parse_str_f64(&ctx.prev_day_px),
                        mark_price: parse_str_f64(&ctx.mark_px),
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_does_not_panic() {
        let _client = MarketDataClient::new("https://example.test/info");
    }
}
