use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Direction, TradeStatus};

/// Database row for trades table.
///
/// Exactly one of `trader_id` / `user_id` is set: trader trades fan out to
/// copiers, direct trades belong to a single user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub trader_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub market: String,
    pub direction: String,
    pub duration: String,
    pub amount: Decimal,
    pub investment_amount: Option<Decimal>,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub profit_loss_percent: Decimal,
    pub status: String,
    pub reference: String,
    pub notes: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn status(&self) -> Option<TradeStatus> {
        TradeStatus::from_api_str(&self.status)
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::from_api_str(&self.direction)
    }

    pub fn is_closed(&self) -> bool {
        self.status() == Some(TradeStatus::Closed)
    }

    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }

    pub fn is_direct(&self) -> bool {
        self.trader_id.is_none()
    }

    pub fn is_profit(&self) -> bool {
        self.profit_loss_percent >= Decimal::ZERO
    }
}
