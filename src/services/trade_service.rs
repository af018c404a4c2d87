use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::notifier::{self, Notifier};
use super::{Page, ServiceResult};
use crate::db::trade_repo::{self, TradeFilter};
use crate::db::{copy_repo, trader_repo, user_repo};
use crate::ledger::settlement::{self, SettlementEntry};
use crate::ledger::validation::{validate_direct_trade, validate_trade};
use crate::ledger::{profit_loss, SettlementError, TradeError, TradeInput, ValidTrade};
use crate::models::{CopierRow, NotificationDraft, Trade, TradeStatus, Trader};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Trade is open; nothing applied yet.
    Pending,
    /// Applied by this call.
    Settled,
    /// Applied earlier; never re-applied.
    AlreadySettled,
}

/// Result of recording or editing a trade.
#[derive(Debug, Clone, Serialize)]
pub struct TradeOutcome {
    pub trade: Trade,
    pub settlement: SettlementStatus,
    pub entries: Vec<SettlementEntry>,
    pub notified: usize,
}

/// A copier with the P/L they would get (or got) from a trade.
#[derive(Debug, Clone, Serialize)]
pub struct CopierPreview {
    #[serde(flatten)]
    pub copier: CopierRow,
    pub profit_loss: Decimal,
    pub is_profit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeDetail {
    pub trade: Trade,
    pub trader: Option<Trader>,
    pub copiers: Vec<CopierPreview>,
    pub affected_users_count: usize,
}

/// A trade as seen by one copier.
#[derive(Debug, Clone, Serialize)]
pub struct UserTradeView {
    #[serde(flatten)]
    pub trade: Trade,
    pub trader_name: String,
    pub initial_investment: Option<Decimal>,
    pub user_profit_loss: Decimal,
}

/// Writes staged inside a settlement transaction.
pub(crate) struct Settled {
    pub trade: Trade,
    pub entries: Vec<SettlementEntry>,
    pub drafts: Vec<NotificationDraft>,
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// `CT-XXXXXXXX`
pub fn trader_trade_reference() -> String {
    format!("CT-{}", short_hex())
}

/// `UD-<first 8 hex of user id>-XXXXXXXX`
pub fn direct_trade_reference(user_id: Uuid) -> String {
    let user_hex = user_id.simple().to_string();
    format!("UD-{}-{}", &user_hex[..8], short_hex())
}

// ---------------------------------------------------------------------------
// Trader trades
// ---------------------------------------------------------------------------

/// Record a trade for a trader. A closed trade is settled to every current
/// copier in the same transaction; an open one only notifies them.
pub async fn record_trade(
    pool: &PgPool,
    notifier: &Notifier,
    trader_id: Uuid,
    input: &TradeInput,
) -> ServiceResult<TradeOutcome> {
    let now = Utc::now();
    let mut valid = validate_trade(input)?;
    stamp_closed_at(&mut valid, None, now);

    let mut tx = pool.begin().await?;

    let trader = trader_repo::share_lock_trader(&mut *tx, trader_id)
        .await?
        .ok_or(TradeError::TraderNotFound)?;
    if !trader.is_active {
        return Err(TradeError::TraderInactive(trader.name.clone()).into());
    }

    let trade =
        trade_repo::insert_trade(&mut *tx, Some(trader_id), None, &valid, &trader_trade_reference())
            .await?;

    let (trade, settlement, entries, drafts) = if trade.is_closed() {
        let settled = settle_in_tx(&mut tx, &trade, now).await?;
        (settled.trade, SettlementStatus::Settled, settled.entries, settled.drafts)
    } else {
        let copiers = copy_repo::copiers_for_settlement(&mut *tx, trader_id).await?;
        let drafts = copiers
            .iter()
            .map(|c| {
                notifier::format_trade_opened(c.user_id, &trader.name, &trade, c.initial_investment_amount)
            })
            .collect();
        (trade, SettlementStatus::Pending, Vec::new(), drafts)
    };

    tx.commit().await?;

    metrics::counter!("trades_recorded_total", "kind" => "trader").increment(1);
    if settlement == SettlementStatus::Settled {
        record_settlement_metrics(&entries);
    }
    tracing::info!(
        trade_id = %trade.id,
        trader_id = %trader_id,
        reference = %trade.reference,
        status = %trade.status,
        profit_loss_percent = %trade.profit_loss_percent,
        copiers = entries.len(),
        total_profit_loss = %settlement::total_profit_loss(&entries),
        "Trader trade recorded"
    );

    let notified = notifier.send_all(&drafts).await;

    Ok(TradeOutcome {
        trade,
        settlement,
        entries,
        notified,
    })
}

/// Edit a trade. Settles when the edited trade is closed and has never been
/// settled; a settled trade is never settled again.
pub async fn update_trade(
    pool: &PgPool,
    notifier: &Notifier,
    trade_id: Uuid,
    input: &TradeInput,
) -> ServiceResult<TradeOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let existing = trade_repo::lock_trade(&mut *tx, trade_id)
        .await?
        .ok_or(TradeError::NotFound)?;

    let mut valid = if existing.is_direct() && input.investment_amount.is_some() {
        validate_direct_trade(input)?
    } else {
        validate_trade(input)?
    };
    stamp_closed_at(&mut valid, existing.closed_at, now);

    let updated = trade_repo::update_trade(&mut *tx, trade_id, &valid).await?;

    let (trade, settlement, entries, drafts) = if updated.is_settled() {
        if updated.profit_loss_percent != existing.profit_loss_percent
            || updated.status != existing.status
        {
            tracing::warn!(
                trade_id = %trade_id,
                old_percent = %existing.profit_loss_percent,
                new_percent = %updated.profit_loss_percent,
                status = %updated.status,
                "Settled trade edited; settlement is not re-applied"
            );
        }
        (updated, SettlementStatus::AlreadySettled, Vec::new(), Vec::new())
    } else if updated.is_closed() {
        let settled = settle_in_tx(&mut tx, &updated, now).await?;
        (settled.trade, SettlementStatus::Settled, settled.entries, settled.drafts)
    } else {
        (updated, SettlementStatus::Pending, Vec::new(), Vec::new())
    };

    tx.commit().await?;

    if settlement == SettlementStatus::Settled {
        record_settlement_metrics(&entries);
    }
    tracing::info!(
        trade_id = %trade_id,
        status = %trade.status,
        settlement = ?settlement,
        entries = entries.len(),
        "Trade updated"
    );

    let notified = notifier.send_all(&drafts).await;

    Ok(TradeOutcome {
        trade,
        settlement,
        entries,
        notified,
    })
}

/// Delete a trade row. Credits already applied stay applied.
pub async fn delete_trade(pool: &PgPool, trade_id: Uuid) -> ServiceResult<Trade> {
    let mut tx = pool.begin().await?;
    let trade = trade_repo::lock_trade(&mut *tx, trade_id)
        .await?
        .ok_or(TradeError::NotFound)?;
    trade_repo::delete_trade(&mut *tx, trade_id).await?;
    tx.commit().await?;

    if trade.is_settled() {
        tracing::warn!(
            trade_id = %trade_id,
            reference = %trade.reference,
            "Deleted a settled trade; credited results are not reversed"
        );
    } else {
        tracing::info!(trade_id = %trade_id, reference = %trade.reference, "Trade deleted");
    }

    Ok(trade)
}

/// Trade with the P/L each current copier gets from it.
pub async fn trade_detail(pool: &PgPool, trade_id: Uuid) -> ServiceResult<TradeDetail> {
    let trade = trade_repo::get_trade(pool, trade_id)
        .await?
        .ok_or(TradeError::NotFound)?;

    let Some(trader_id) = trade.trader_id else {
        return Ok(TradeDetail {
            trade,
            trader: None,
            copiers: Vec::new(),
            affected_users_count: 1,
        });
    };

    let trader = trader_repo::get_trader(pool, trader_id).await?;
    let copiers = copy_repo::copiers_for_settlement(pool, trader_id).await?;
    let entries = settlement::copier_entries(&trade, &copiers);

    let copiers: Vec<CopierPreview> = copiers
        .into_iter()
        .zip(entries)
        .map(|(copier, entry)| CopierPreview {
            copier,
            profit_loss: entry.profit_loss,
            is_profit: entry.profit_loss >= Decimal::ZERO,
        })
        .collect();

    Ok(TradeDetail {
        trade,
        trader,
        affected_users_count: copiers.len(),
        copiers,
    })
}

pub async fn list_trades(
    pool: &PgPool,
    filter: &TradeFilter<'_>,
    limit: i64,
    offset: i64,
) -> ServiceResult<Page<Trade>> {
    let (limit, offset) = clamp_page(limit, offset);
    let items = trade_repo::list_trader_trades(pool, filter, limit, offset).await?;
    let total = trade_repo::count_trader_trades(pool, filter).await?;
    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}

/// Trades credited to the user through a copy relationship, plus unsettled
/// trades of traders they copy now, with the user's result from that
/// relationship's starting balance. Trades settled outside the copying
/// window were never credited to the user and are left out.
pub async fn user_trade_history(
    pool: &PgPool,
    user_id: Uuid,
    filter: &TradeFilter<'_>,
    limit: i64,
    offset: i64,
) -> ServiceResult<Page<UserTradeView>> {
    let (limit, offset) = clamp_page(limit, offset);

    let relationships = copy_repo::list_for_user(pool, user_id, false).await?;
    if relationships.is_empty() {
        return Ok(Page {
            items: Vec::new(),
            total: 0,
            limit,
            offset,
        });
    }

    let by_trader: HashMap<Uuid, &CopierRow> =
        relationships.iter().map(|r| (r.trader_id, r)).collect();

    let trades = trade_repo::list_copied_trades(pool, user_id, filter, limit, offset).await?;
    let total = trade_repo::count_copied_trades(pool, user_id, filter).await?;

    let items = trades
        .into_iter()
        .filter_map(|trade| {
            let rel = by_trader.get(&trade.trader_id?)?;
            Some(UserTradeView {
                trader_name: rel.trader_name.clone(),
                initial_investment: rel.initial_investment_amount,
                user_profit_loss: profit_loss(trade.profit_loss_percent, rel.initial_investment_amount),
                trade,
            })
        })
        .collect();

    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Apply a closed, unsettled trade inside `tx` and stamp it settled.
/// Notifications are returned as drafts for the caller to send after commit.
pub(crate) async fn settle_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    trade: &Trade,
    now: DateTime<Utc>,
) -> ServiceResult<Settled> {
    match trade.trader_id {
        Some(trader_id) => settle_trader_trade(tx, trade, trader_id, now).await,
        None => settle_direct_trade(tx, trade, now).await,
    }
}

async fn settle_trader_trade(
    tx: &mut Transaction<'_, Postgres>,
    trade: &Trade,
    trader_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<Settled> {
    let trader = trader_repo::share_lock_trader(&mut **tx, trader_id)
        .await?
        .ok_or(TradeError::TraderNotFound)?;
    // Stamped under the trader lock so it orders against every join and unlink.
    let now = now.max(Utc::now());

    // Ordered by user id: concurrent settlements lock users in one order.
    let copiers = copy_repo::copiers_for_settlement(&mut **tx, trader_id).await?;
    let entries = settlement::plan_copier_settlement(trade, &copiers)?;

    for entry in entries.iter().filter(|e| !e.profit_loss.is_zero()) {
        user_repo::credit_balance_and_profit(&mut **tx, entry.user_id, entry.profit_loss).await?;
    }

    let settled = trade_repo::mark_settled(&mut **tx, trade.id, now).await?;

    let drafts = entries
        .iter()
        .map(|e| {
            notifier::format_trade_settled(e.user_id, &trader.name, &settled, e.capital_base, e.profit_loss)
        })
        .collect();

    Ok(Settled {
        trade: settled,
        entries,
        drafts,
    })
}

async fn settle_direct_trade(
    tx: &mut Transaction<'_, Postgres>,
    trade: &Trade,
    now: DateTime<Utc>,
) -> ServiceResult<Settled> {
    let entry = settlement::plan_direct_settlement(trade)?;

    if let Some(e) = &entry {
        user_repo::credit_profit(&mut **tx, e.user_id, e.profit_loss).await?;
    }

    let settled = trade_repo::mark_settled(&mut **tx, trade.id, now).await?;

    let user_id = settled.user_id.ok_or(SettlementError::NoOwner(settled.id))?;
    let pl = entry.as_ref().map(|e| e.profit_loss).unwrap_or(Decimal::ZERO);
    let drafts = vec![notifier::format_direct_trade_settled(user_id, &settled, pl)];

    Ok(Settled {
        trade: settled,
        entries: entry.into_iter().collect(),
        drafts,
    })
}

pub(crate) fn record_settlement_metrics(entries: &[SettlementEntry]) {
    metrics::counter!("settlements_total").increment(1);
    metrics::counter!("settlement_entries_total").increment(entries.len() as u64);
    metrics::histogram!("settlement_fanout_size").record(entries.len() as f64);
}

/// Closed trades get a close time (kept if already known, else now);
/// open trades have none.
pub(crate) fn stamp_closed_at(
    valid: &mut ValidTrade,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    valid.closed_at = match valid.status {
        TradeStatus::Closed => valid.closed_at.or(previous).or(Some(now)),
        TradeStatus::Open => None,
    };
}

pub(crate) fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    };
    (limit, offset.max(0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
