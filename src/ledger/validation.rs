use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{normalize_duration, Direction, TradeStatus};

const MAX_MARKET_LEN: usize = 50;
const PRICE_DP: u32 = 8;
const PERCENT_DP: u32 = 2;
const MONEY_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Trade not found")]
    NotFound,

    #[error("Trader not found")]
    TraderNotFound,

    #[error("{0} is not active")]
    TraderInactive(String),

    #[error("User not found")]
    UserNotFound,
}

impl TradeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        TradeError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TradeError::NotFound | TradeError::TraderNotFound | TradeError::UserNotFound
        )
    }
}

/// Trade fields as submitted by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeInput {
    pub market: String,
    pub direction: String,
    pub duration: String,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub profit_loss_percent: Decimal,
    pub status: String,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Required for direct user trades, ignored for trader trades.
    #[serde(default)]
    pub investment_amount: Option<Decimal>,
}

/// Trade fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTrade {
    pub market: String,
    pub direction: Direction,
    pub duration: &'static str,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub profit_loss_percent: Decimal,
    pub status: TradeStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub investment_amount: Option<Decimal>,
}

/// Validate a trader trade.
pub fn validate_trade(input: &TradeInput) -> Result<ValidTrade, TradeError> {
    let market = input.market.trim();
    if market.is_empty() {
        return Err(TradeError::invalid("market", "must not be empty"));
    }
    if market.chars().count() > MAX_MARKET_LEN {
        return Err(TradeError::invalid(
            "market",
            format!("must be at most {MAX_MARKET_LEN} characters"),
        ));
    }

    let direction = Direction::from_api_str(&input.direction)
        .ok_or_else(|| TradeError::invalid("direction", "must be one of buy, sell, futures"))?;

    let duration = normalize_duration(&input.duration)
        .ok_or_else(|| TradeError::invalid("duration", format!("'{}' is not a supported duration", input.duration)))?;

    let status = TradeStatus::from_api_str(&input.status)
        .ok_or_else(|| TradeError::invalid("status", "must be open or closed"))?;

    positive("amount", input.amount, PRICE_DP)?;
    positive("entry_price", input.entry_price, PRICE_DP)?;
    if let Some(exit) = input.exit_price {
        positive("exit_price", exit, PRICE_DP)?;
    }

    let pct = input.profit_loss_percent;
    if pct.normalize().scale() > PERCENT_DP {
        return Err(TradeError::invalid(
            "profit_loss_percent",
            format!("at most {PERCENT_DP} decimal places"),
        ));
    }
    if pct.abs() >= Decimal::from(100_000_000) {
        return Err(TradeError::invalid("profit_loss_percent", "out of range"));
    }

    let notes = input.notes.as_deref().unwrap_or_default().trim().to_string();

    Ok(ValidTrade {
        market: market.to_string(),
        direction,
        duration,
        amount: input.amount,
        entry_price: input.entry_price,
        exit_price: input.exit_price,
        profit_loss_percent: pct,
        status,
        closed_at: input.closed_at,
        notes,
        investment_amount: None,
    })
}

/// Validate a direct user trade: trader-trade rules plus a mandatory
/// investment amount in whole cents.
pub fn validate_direct_trade(input: &TradeInput) -> Result<ValidTrade, TradeError> {
    let mut valid = validate_trade(input)?;
    let investment = input
        .investment_amount
        .ok_or_else(|| TradeError::invalid("investment_amount", "is required"))?;
    positive("investment_amount", investment, MONEY_DP)?;
    valid.investment_amount = Some(investment);
    Ok(valid)
}

fn positive(field: &'static str, value: Decimal, max_dp: u32) -> Result<(), TradeError> {
    if value <= Decimal::ZERO {
        return Err(TradeError::invalid(field, "must be greater than zero"));
    }
    if value.normalize().scale() > max_dp {
        return Err(TradeError::invalid(
            field,
            format!("at most {max_dp} decimal places"),
        ));
    }
    if value >= Decimal::from(1_000_000_000_000i64) {
        return Err(TradeError::invalid(field, "out of range"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
