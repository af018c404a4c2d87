use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::pnl::profit_loss;
use crate::models::{CopierRow, Trade};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("trade {0} is still open")]
    NotClosed(Uuid),

    #[error("trade {0} has already been settled")]
    AlreadySettled(Uuid),

    #[error("trade {0} has no owning user")]
    NoOwner(Uuid),
}

/// One credit produced by settling a trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementEntry {
    pub user_id: Uuid,
    pub copy_id: Option<Uuid>,
    pub capital_base: Option<Decimal>,
    pub profit_loss: Decimal,
    /// Copier settlements move balance and profit; direct trades only profit.
    pub credits_balance: bool,
}

/// A trade may be settled once, and only after it closed.
pub fn ensure_settleable(trade: &Trade) -> Result<(), SettlementError> {
    if !trade.is_closed() {
        return Err(SettlementError::NotClosed(trade.id));
    }
    if trade.is_settled() {
        return Err(SettlementError::AlreadySettled(trade.id));
    }
    Ok(())
}

/// Per-copier P/L for a trade, without checking whether it may be settled.
/// Used for previews on open trades as well as for settlement itself.
pub fn copier_entries(trade: &Trade, copiers: &[CopierRow]) -> Vec<SettlementEntry> {
    copiers
        .iter()
        .map(|c| SettlementEntry {
            user_id: c.user_id,
            copy_id: Some(c.id),
            capital_base: c.initial_investment_amount,
            profit_loss: profit_loss(trade.profit_loss_percent, c.initial_investment_amount),
            credits_balance: true,
        })
        .collect()
}

/// Fan-out plan for a trader trade. `copiers` must be every relationship
/// still copying the trader, cancel-pending ones included.
pub fn plan_copier_settlement(
    trade: &Trade,
    copiers: &[CopierRow],
) -> Result<Vec<SettlementEntry>, SettlementError> {
    ensure_settleable(trade)?;
    Ok(copier_entries(trade, copiers))
}

/// Plan for a direct user trade: capital base is the trade's own investment
/// amount. Returns `None` when the result is zero and nothing is credited.
pub fn plan_direct_settlement(trade: &Trade) -> Result<Option<SettlementEntry>, SettlementError> {
    ensure_settleable(trade)?;
    let user_id = trade.user_id.ok_or(SettlementError::NoOwner(trade.id))?;

    let pl = profit_loss(trade.profit_loss_percent, trade.investment_amount);
    if pl.is_zero() {
        return Ok(None);
    }

    Ok(Some(SettlementEntry {
        user_id,
        copy_id: None,
        capital_base: trade.investment_amount,
        profit_loss: pl,
        credits_balance: false,
    }))
}

pub fn total_profit_loss(entries: &[SettlementEntry]) -> Decimal {
    entries.iter().map(|e| e.profit_loss).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trade(status: &str, pct: Decimal) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            trader_id: Some(Uuid::new_v4()),
            user_id: None,
            market: "BTC/USD".into(),
            direction: "buy".into(),
            duration: "1 hour".into(),
            amount: Decimal::from(1_000),
            investment_amount: None,
            entry_price: Decimal::from(50_000),
            exit_price: Some(Decimal::from(55_000)),
            profit_loss_percent: pct,
            status: status.into(),
            reference: "CT-TEST0001".into(),
            notes: String::new(),
            opened_at: Utc::now(),
            closed_at: None,
            settled_at: None,
        }
    }

    fn copier(investment: Option<Decimal>, cancel_requested: bool) -> CopierRow {
        CopierRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_email: "copier@example.com".into(),
            user_first_name: String::new(),
            user_last_name: String::new(),
            trader_id: Uuid::new_v4(),
            trader_name: "Ava Stone".into(),
            initial_investment_amount: investment,
            cancel_requested,
            cancel_requested_at: None,
            started_copying_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_trade_not_settleable() {
        let t = trade("open", Decimal::from(10));
        assert_eq!(
            plan_copier_settlement(&t, &[]).unwrap_err(),
            SettlementError::NotClosed(t.id)
        );
    }

    #[test]
    fn test_settled_trade_not_settleable_again() {
        let mut t = trade("closed", Decimal::from(10));
        t.settled_at = Some(Utc::now());
        assert_eq!(
            plan_copier_settlement(&t, &[]).unwrap_err(),
            SettlementError::AlreadySettled(t.id)
        );
    }

    #[test]
    fn test_each_copier_uses_own_snapshot() {
        let t = trade("closed", Decimal::from(10));
        let copiers = vec![
            copier(Some(Decimal::from(1_000)), false),
            copier(Some(Decimal::from(250)), true),
        ];

        let entries = plan_copier_settlement(&t, &copiers).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].profit_loss, Decimal::from(100));
        // cancel-pending copiers are still settled
        assert_eq!(entries[1].profit_loss, Decimal::from(25));
        assert!(entries.iter().all(|e| e.credits_balance));
        assert_eq!(total_profit_loss(&entries), Decimal::from(125));
    }

    #[test]
    fn test_copier_without_snapshot_gets_zero() {
        let t = trade("closed", Decimal::from(-20));
        let entries = plan_copier_settlement(&t, &[copier(None, false)]).unwrap();
        assert_eq!(entries[0].profit_loss, Decimal::ZERO);
    }

    #[test]
    fn test_direct_trade_credits_profit_only() {
        let mut t = trade("closed", Decimal::new(-550, 2));
        t.trader_id = None;
        t.user_id = Some(Uuid::new_v4());
        t.investment_amount = Some(Decimal::from(2_000));

        let entry = plan_direct_settlement(&t).unwrap().expect("non-zero result");
        assert_eq!(entry.profit_loss, Decimal::from(-110));
        assert!(!entry.credits_balance);
        assert_eq!(entry.user_id, t.user_id.unwrap());
    }

    #[test]
    fn test_direct_trade_zero_result_skipped() {
        let mut t = trade("closed", Decimal::ZERO);
        t.trader_id = None;
        t.user_id = Some(Uuid::new_v4());
        t.investment_amount = Some(Decimal::from(2_000));
        assert_eq!(plan_direct_settlement(&t).unwrap(), None);
    }

    #[test]
    fn test_preview_ignores_status() {
        let t = trade("open", Decimal::from(5));
        let entries = copier_entries(&t, &[copier(Some(Decimal::from(400)), false)]);
        assert_eq!(entries[0].profit_loss, Decimal::from(20));
    }
}
