pub mod bots;
pub mod client;
pub mod logs;
pub mod positions;
pub mod scanner_levels;

pub use bots::{BotRow, StoreBotClient, StrategyRow};
pub use client::StoreClient;
pub use logs::StoreLogClient;
pub use positions::StorePositionClient;
pub use scanner_levels::{ScannerLevelRow, ScannerLevelsStore};
