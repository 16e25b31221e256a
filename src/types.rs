// =============================================================================
// Shared domain types used across the execution engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Long or short, as carried on positions and entry intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Buy or sell, as carried on trade rows. Derived from a position's side and
/// whether the trade is the opening or closing leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Paper/live tag carried on bot instances and trade rows. Per the Non-goal
/// on real order execution, the engine never branches on this value — both
/// variants take the identical paper-trading execution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    Paper,
    Live,
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "paper"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Category of a `bot_logs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Info,
    Error,
    Signal,
    Trade,
    MarketData,
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Signal => "signal",
            Self::Trade => "trade",
            Self::MarketData => "market_data",
        };
        write!(f, "{s}")
    }
}

/// Which live per-symbol status tile a log row represents. Tiles are updated
/// in place rather than appended, so a UI sorted by `created_at desc` keeps
/// them pinned at a stable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    PositionStatus,
    Monitoring,
    MarketMetrics,
}

impl std::fmt::Display for TileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PositionStatus => "position_status",
            Self::Monitoring => "monitoring",
            Self::MarketMetrics => "market_metrics",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_display_matches_store_convention() {
        assert_eq!(Side::Long.to_string(), "long");
        assert_eq!(Side::Short.to_string(), "short");
    }

    #[test]
    fn tile_kind_display_matches_store_convention() {
        assert_eq!(TileKind::PositionStatus.to_string(), "position_status");
        assert_eq!(TileKind::MarketMetrics.to_string(), "market_metrics");
    }
}
