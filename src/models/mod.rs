pub mod copy_relationship;
pub mod notification;
pub mod trade;
pub mod trader;
pub mod user;

pub use copy_relationship::{CopierRow, CopyRelationship};
pub use notification::{Notification, NotificationDraft};
pub use trade::Trade;
pub use trader::Trader;
pub use user::User;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Futures,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
            Direction::Futures => "futures",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Some(Direction::Buy),
            "sell" => Some(Direction::Sell),
            "futures" => Some(Direction::Futures),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TradeStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(TradeStatus::Open),
            "closed" => Some(TradeStatus::Closed),
            _ => None,
        }
    }

    /// "Open" / "Closed", as shown in notification details.
    pub fn display_name(&self) -> &'static str {
        match self {
            TradeStatus::Open => "Open",
            TradeStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Durations: the fixed set of holding periods an admin may pick
// ---------------------------------------------------------------------------

pub const TRADE_DURATIONS: &[&str] = &[
    "2 minutes",
    "5 minutes",
    "10 minutes",
    "15 minutes",
    "30 minutes",
    "1 hour",
    "2 hours",
    "4 hours",
    "12 hours",
    "1 day",
    "2 days",
    "1 week",
    "2 weeks",
    "1 month",
];

pub fn normalize_duration(s: &str) -> Option<&'static str> {
    let wanted = s.trim().to_lowercase();
    TRADE_DURATIONS.iter().copied().find(|d| *d == wanted)
}

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CopyTrader,
    Trade,
    Alert,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CopyTrader => "copy_trader",
            NotificationKind::Trade => "trade",
            NotificationKind::Alert => "alert",
            NotificationKind::System => "system",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing_is_case_insensitive() {
        assert_eq!(Direction::from_api_str("BUY"), Some(Direction::Buy));
        assert_eq!(Direction::from_api_str(" futures "), Some(Direction::Futures));
        assert_eq!(Direction::from_api_str("short"), None);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(TradeStatus::from_api_str("Closed"), Some(TradeStatus::Closed));
        assert_eq!(TradeStatus::from_api_str("pending"), None);
        assert_eq!(TradeStatus::Closed.display_name(), "Closed");
    }

    #[test]
    fn test_duration_must_be_known() {
        assert_eq!(normalize_duration("1 Hour"), Some("1 hour"));
        assert_eq!(normalize_duration("3 hours"), None);
    }
}
