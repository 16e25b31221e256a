// =============================================================================
// Candle Cache — TTL-keyed memo over the market data client's candle fetches
// =============================================================================
//
// Two independent instances exist in the running engine: one per bot
// (60s TTL) and one owned by the scanner worker (300s TTL). They never share
// a map — each bot's cache is private, and the scanner's cache is its own.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::client::MarketDataClient;
use super::types::Candle;

/// Delay before a cache-miss fetch, to stay polite to the provider's rate limit.
const INTER_CALL_DELAY: Duration = Duration::from_millis(1_500);

/// TTL used by each bot's own candle cache.
pub const PER_BOT_TTL: Duration = Duration::from_secs(60);

/// TTL used by the scanner worker's candle cache.
pub const SCANNER_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    interval: String,
    start_bucket_ms: i64,
}

struct CacheEntry {
    candles: Vec<Candle>,
    fetched_at: Instant,
}

pub struct CandleCache {
    market: Arc<MarketDataClient>,
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl CandleCache {
    pub fn new(market: Arc<MarketDataClient>, ttl: Duration) -> Self {
        Self { market, ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn per_bot(market: Arc<MarketDataClient>) -> Self {
        Self::new(market, PER_BOT_TTL)
    }

    pub fn scanner(market: Arc<MarketDataClient>) -> Self {
        Self::new(market, SCANNER_TTL)
    }

    /// Fetch candles for `symbol`/`interval` covering `[start_ms, end_ms)`,
    /// serving from cache when the bucketed start time was fetched within the
    /// TTL. On a fetch error, falls back to a stale cached value if one
    /// exists; otherwise propagates the error.
    pub async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        let start_bucket_ms = (start_ms / 60_000) * 60_000;
        let key = CacheKey {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            start_bucket_ms,
        };

        if let Some(entry) = self.entries.read().get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(symbol, interval, "candle cache hit");
                return Ok(entry.candles.clone());
            }
        }

        tokio::time::sleep(INTER_CALL_DELAY).await;

        match self.market.candles(symbol, interval, start_ms, end_ms).await {
            Ok(candles) => {
                self.entries.write().insert(
                    key,
                    CacheEntry { candles: candles.clone(), fetched_at: Instant::now() },
                );
                Ok(candles)
            }
            Err(e) => {
                if let Some(entry) = self.entries.read().get(&key) {
                    warn!(symbol, interval, error = %e, "candle fetch failed, using stale cache");
                    return Ok(entry.candles.clone());
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> CandleCache {
        CandleCache::new(
            Arc::new(MarketDataClient::new("https://example.test/info")),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn start_ms_is_bucketed_to_enclosing_minute() {
        // Two start times within the same minute must collide on the same key.
        let a = (1_700_000_075_000i64 / 60_000) * 60_000;
        let b = (1_700_000_003_000i64 / 60_000) * 60_000;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_cache_has_no_entries() {
        let cache = cache();
        assert!(cache.entries.read().is_empty());
    }
}
