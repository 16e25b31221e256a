// =============================================================================
// Engine configuration — loaded once from the environment at startup
// =============================================================================
//
// Unlike the strategy/bot configuration (which lives entirely in the external
// row-store and is read fresh every supervisor tick), this is process-wide
// bootstrap configuration: where to find the store, where to find the
// exchange, and which port to bind the health endpoint on.
// =============================================================================

use anyhow::{Context, Result};

/// Process-wide configuration, loaded once at startup and shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the row-store's REST endpoint.
    pub store_url: String,
    /// Service-role key sent with every store request.
    pub store_service_key: String,
    /// Base URL of the exchange market-data HTTP endpoint.
    pub exchange_api_url: String,
    /// Port the health endpoint binds to.
    pub health_port: u16,
    /// Optional override of the symbol universe (unused unless a caller
    /// wants to restrict which symbols the scanner considers).
    pub symbols_override: Option<Vec<String>>,
}

const DEFAULT_EXCHANGE_API_URL: &str = "https://api.hyperliquid.xyz/info";
const DEFAULT_HEALTH_PORT: u16 = 8080;

impl Config {
    /// Load configuration from the environment. Fatal if the store
    /// credentials are missing — the engine cannot run without a store.
    pub fn from_env() -> Result<Self> {
        let store_url = std::env::var("STORE_URL")
            .context("STORE_URL is required — the engine cannot run without a row-store")?;
        let store_service_key = std::env::var("STORE_SERVICE_KEY").context(
            "STORE_SERVICE_KEY is required — the engine cannot run without a row-store",
        )?;

        let exchange_api_url = std::env::var("EXCHANGE_API_URL")
            .unwrap_or_else(|_| DEFAULT_EXCHANGE_API_URL.to_string());

        let health_port = std::env::var("HEALTH_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HEALTH_PORT);

        let symbols_override = std::env::var("SYMBOLS_OVERRIDE").ok().map(|s| {
            s.split(',')
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect()
        });

        Ok(Self {
            store_url,
            store_service_key,
            exchange_api_url,
            health_port,
            symbols_override,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            "STORE_URL",
            "STORE_SERVICE_KEY",
            "EXCHANGE_API_URL",
            "HEALTH_PORT",
            "SYMBOLS_OVERRIDE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_store_url_is_fatal() {
        clear_env();
        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        clear_env();
        std::env::set_var("STORE_URL", "https://store.example.test");
        std::env::set_var("STORE_SERVICE_KEY", "secret");
        let config = Config::from_env().unwrap();
        assert_eq!(config.exchange_api_url, DEFAULT_EXCHANGE_API_URL);
        assert_eq!(config.health_port, DEFAULT_HEALTH_PORT);
        assert!(config.symbols_override.is_none());
        clear_env();
    }

    #[test]
    fn symbols_override_parses_and_normalizes() {
        clear_env();
        std::env::set_var("STORE_URL", "https://store.example.test");
        std::env::set_var("STORE_SERVICE_KEY", "secret");
        std::env::set_var("SYMBOLS_OVERRIDE", " btc, eth ,,sol");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.symbols_override,
            Some(vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()])
        );
        clear_env();
    }
}
