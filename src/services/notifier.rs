use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::notification_repo;
use crate::models::{NotificationDraft, NotificationKind, Trade, TradeStatus};

/// Writes user notifications. Failures are logged and counted but never
/// block or roll back the main flow.
#[derive(Debug, Clone)]
pub struct Notifier {
    db: PgPool,
    enabled: bool,
}

impl Notifier {
    pub fn new(db: PgPool, enabled: bool) -> Self {
        Self { db, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Persist one notification. Returns whether it was written.
    pub async fn send(&self, draft: &NotificationDraft) -> bool {
        if !self.enabled {
            return false;
        }

        match notification_repo::insert_notification(&self.db, draft).await {
            Ok(n) => {
                tracing::debug!(
                    notification_id = %n.id,
                    user_id = %draft.user_id,
                    kind = %draft.kind,
                    "Notification written"
                );
                true
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total").increment(1);
                tracing::warn!(
                    error = %e,
                    user_id = %draft.user_id,
                    title = %draft.title,
                    "Failed to write notification"
                );
                false
            }
        }
    }

    /// Persist a batch; returns how many were written.
    pub async fn send_all(&self, drafts: &[NotificationDraft]) -> usize {
        let mut sent = 0;
        for draft in drafts {
            if self.send(draft).await {
                sent += 1;
            }
        }
        sent
    }
}

// ---------------------------------------------------------------------------
// Wording
// ---------------------------------------------------------------------------

fn draft(
    user_id: Uuid,
    kind: NotificationKind,
    title: String,
    message: String,
    detail: String,
) -> NotificationDraft {
    NotificationDraft {
        user_id,
        kind,
        title,
        message,
        detail,
    }
}

fn money(amount: Option<Decimal>) -> String {
    match amount {
        Some(a) => format!("{:.2}", a),
        None => "0.00".to_string(),
    }
}

fn status_name(trade: &Trade) -> &'static str {
    trade
        .status()
        .map(|s| s.display_name())
        .unwrap_or(TradeStatus::Open.display_name())
}

pub fn format_copy_started(user_id: Uuid, trader_name: &str, investment: Decimal) -> NotificationDraft {
    draft(
        user_id,
        NotificationKind::CopyTrader,
        format!("Now Copying {trader_name}"),
        format!("You are now copying {trader_name}."),
        format!(
            "Your copy relationship with {trader_name} is active. Trades are settled against your starting balance of ${:.2}.",
            investment
        ),
    )
}

pub fn format_cancel_accepted(user_id: Uuid, trader_name: &str) -> NotificationDraft {
    draft(
        user_id,
        NotificationKind::CopyTrader,
        "Copy Cancelled".into(),
        format!("Your copy relationship with {trader_name} has been cancelled."),
        format!("You are no longer copying {trader_name}."),
    )
}

pub fn format_cancel_rejected(user_id: Uuid, trader_name: &str) -> NotificationDraft {
    draft(
        user_id,
        NotificationKind::CopyTrader,
        "Cancel Request Rejected".into(),
        format!("You are still copying {trader_name}."),
        format!(
            "Your cancel request for {trader_name} was rejected. You will continue copying this trader."
        ),
    )
}

pub fn format_unlinked(user_id: Uuid, trader_name: &str) -> NotificationDraft {
    draft(
        user_id,
        NotificationKind::CopyTrader,
        "Trader Unlinked".into(),
        format!("You have been unlinked from {trader_name}."),
        format!("Your copy relationship with {trader_name} has been terminated."),
    )
}

/// Result of a settled trader trade for one copier.
pub fn format_trade_settled(
    user_id: Uuid,
    trader_name: &str,
    trade: &Trade,
    investment: Option<Decimal>,
    pl: Decimal,
) -> NotificationDraft {
    let gained = pl >= Decimal::ZERO;
    let title = if gained {
        format!("Trade Profit from {trader_name}!")
    } else {
        format!("Trade Update from {trader_name}")
    };
    let message = format!(
        "Copy trade on {} {} ${:.2}",
        trade.market,
        if gained { "gained" } else { "lost" },
        pl.abs()
    );

    draft(
        user_id,
        NotificationKind::Trade,
        title,
        message,
        trade_detail(Some(trader_name), trade, investment, pl),
    )
}

/// A trader opened a position; nothing is credited yet.
pub fn format_trade_opened(
    user_id: Uuid,
    trader_name: &str,
    trade: &Trade,
    investment: Option<Decimal>,
) -> NotificationDraft {
    draft(
        user_id,
        NotificationKind::Trade,
        format!("New Trade from {trader_name}"),
        format!(
            "{trader_name} opened a {} trade on {}",
            trade.direction.to_uppercase(),
            trade.market
        ),
        trade_detail(Some(trader_name), trade, investment, Decimal::ZERO),
    )
}

pub fn format_direct_trade_settled(user_id: Uuid, trade: &Trade, pl: Decimal) -> NotificationDraft {
    let gained = pl >= Decimal::ZERO;
    draft(
        user_id,
        NotificationKind::Trade,
        if gained {
            "Trade Profit!".to_string()
        } else {
            "Trade Update".to_string()
        },
        format!(
            "Trade on {} {} ${:.2}",
            trade.market,
            if gained { "gained" } else { "lost" },
            pl.abs()
        ),
        trade_detail(None, trade, trade.investment_amount, pl),
    )
}

fn trade_detail(
    trader_name: Option<&str>,
    trade: &Trade,
    investment: Option<Decimal>,
    pl: Decimal,
) -> String {
    let mut lines = Vec::with_capacity(6);
    if let Some(name) = trader_name {
        lines.push(format!("Trader: {name}"));
    }
    lines.push(format!("Market: {}", trade.market));
    lines.push(format!("Direction: {}", trade.direction.to_uppercase()));
    lines.push(format!("Your Investment: ${}", money(investment)));
    lines.push(format!(
        "P/L: ${:.2} ({}%)",
        pl, trade.profit_loss_percent
    ));
    lines.push(format!("Status: {}", status_name(trade)));
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trade(pct: Decimal) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            trader_id: Some(Uuid::new_v4()),
            user_id: None,
            market: "ETH/USD".into(),
            direction: "sell".into(),
            duration: "4 hours".into(),
            amount: Decimal::from(2),
            investment_amount: None,
            entry_price: Decimal::from(3_000),
            exit_price: Some(Decimal::from(2_900)),
            profit_loss_percent: pct,
            status: "closed".into(),
            reference: "CT-0000ABCD".into(),
            notes: String::new(),
            opened_at: Utc::now(),
            closed_at: Some(Utc::now()),
            settled_at: None,
        }
    }

    #[test]
    fn test_settled_gain_wording() {
        let user = Uuid::new_v4();
        let t = trade(Decimal::new(1000, 2));
        let d = format_trade_settled(user, "Ava Stone", &t, Some(Decimal::new(100000, 2)), Decimal::from(100));

        assert_eq!(d.user_id, user);
        assert_eq!(d.kind, NotificationKind::Trade);
        assert_eq!(d.title, "Trade Profit from Ava Stone!");
        assert_eq!(d.message, "Copy trade on ETH/USD gained $100.00");
        assert_eq!(
            d.detail,
            "Trader: Ava Stone\nMarket: ETH/USD\nDirection: SELL\nYour Investment: $1000.00\nP/L: $100.00 (10.00%)\nStatus: Closed"
        );
    }

    #[test]
    fn test_settled_loss_wording() {
        let t = trade(Decimal::new(-550, 2));
        let d = format_trade_settled(Uuid::new_v4(), "Ava Stone", &t, Some(Decimal::from(200)), Decimal::from(-11));
        assert_eq!(d.title, "Trade Update from Ava Stone");
        assert_eq!(d.message, "Copy trade on ETH/USD lost $11.00");
        assert!(d.detail.contains("P/L: $-11.00 (-5.50%)"));
    }

    #[test]
    fn test_zero_result_uses_gain_framing() {
        let t = trade(Decimal::ZERO);
        let d = format_trade_settled(Uuid::new_v4(), "Ava Stone", &t, None, Decimal::ZERO);
        assert_eq!(d.title, "Trade Profit from Ava Stone!");
        assert!(d.detail.contains("Your Investment: $0.00"));
    }

    #[test]
    fn test_admin_decision_wording() {
        let user = Uuid::new_v4();
        assert_eq!(format_cancel_accepted(user, "Ava").title, "Copy Cancelled");
        assert_eq!(
            format_cancel_rejected(user, "Ava").message,
            "You are still copying Ava."
        );
        let unlinked = format_unlinked(user, "Ava");
        assert_eq!(unlinked.title, "Trader Unlinked");
        assert_eq!(unlinked.kind, NotificationKind::CopyTrader);
        assert_eq!(
            unlinked.detail,
            "Your copy relationship with Ava has been terminated."
        );
    }

    #[test]
    fn test_direct_trade_has_no_trader_line() {
        let mut t = trade(Decimal::from(5));
        t.trader_id = None;
        t.investment_amount = Some(Decimal::from(400));
        let d = format_direct_trade_settled(Uuid::new_v4(), &t, Decimal::from(20));
        assert!(!d.detail.contains("Trader:"));
        assert!(d.detail.starts_with("Market: ETH/USD"));
        assert!(d.detail.contains("Your Investment: $400.00"));
    }
}
