pub mod candle_cache;
pub mod client;
pub mod types;

pub use candle_cache::CandleCache;
pub use client::MarketDataClient;
pub use types::{parse_str_f64, Candle, ExchangeSide, L2Book, Trade};
