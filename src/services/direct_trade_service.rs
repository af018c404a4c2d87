use chrono::Utc;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::notifier::Notifier;
use super::trade_service::{
    direct_trade_reference, record_settlement_metrics, settle_in_tx, stamp_closed_at,
    SettlementStatus, TradeOutcome,
};
use super::ServiceResult;
use crate::db::{trade_repo, user_repo};
use crate::ledger::validation::validate_direct_trade;
use crate::ledger::{TradeError, TradeInput, ValidTrade};
use crate::models::{NotificationDraft, Trade, User};

/// A user's direct trades with open/closed counts.
#[derive(Debug, Clone, Serialize)]
pub struct UserDirectTrades {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub open_count: usize,
    pub closed_count: usize,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub created: Vec<TradeOutcome>,
    /// Requested ids that matched no active user.
    pub skipped_user_ids: Vec<Uuid>,
}

pub async fn record_direct_trade(
    pool: &PgPool,
    notifier: &Notifier,
    user_id: Uuid,
    input: &TradeInput,
) -> ServiceResult<TradeOutcome> {
    let mut valid = validate_direct_trade(input)?;
    stamp_closed_at(&mut valid, None, Utc::now());

    let mut tx = pool.begin().await?;
    let user = user_repo::lock_user(&mut *tx, user_id)
        .await?
        .ok_or(TradeError::UserNotFound)?;
    let (outcome, drafts) = insert_for_user(&mut tx, &user, &valid).await?;
    tx.commit().await?;

    finish(notifier, vec![(outcome, drafts)]).await.pop().ok_or_else(|| {
        anyhow::anyhow!("direct trade for user {user_id} produced no outcome").into()
    })
}

/// Record the same trade for many users in one transaction. Duplicate ids
/// are collapsed; unknown or inactive ids are skipped.
pub async fn bulk_direct_trades(
    pool: &PgPool,
    notifier: &Notifier,
    user_ids: &[Uuid],
    input: &TradeInput,
) -> ServiceResult<BulkOutcome> {
    let mut valid = validate_direct_trade(input)?;
    stamp_closed_at(&mut valid, None, Utc::now());

    let mut ids: Vec<Uuid> = Vec::with_capacity(user_ids.len());
    for id in user_ids {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    if ids.is_empty() {
        return Err(TradeError::Invalid {
            field: "user_ids",
            reason: "select at least one user".into(),
        }
        .into());
    }

    let mut tx = pool.begin().await?;

    let mut users = user_repo::get_active_users(&mut *tx, &ids).await?;
    // Same user order as settlement fan-out.
    users.sort_by_key(|u| u.id);

    let skipped_user_ids: Vec<Uuid> = ids
        .iter()
        .filter(|id| !users.iter().any(|u| u.id == **id))
        .copied()
        .collect();

    let mut staged = Vec::with_capacity(users.len());
    for user in &users {
        staged.push(insert_for_user(&mut tx, user, &valid).await?);
    }

    tx.commit().await?;

    tracing::info!(
        requested = ids.len(),
        created = staged.len(),
        skipped = skipped_user_ids.len(),
        market = %valid.market,
        "Bulk direct trades recorded"
    );

    let created = finish(notifier, staged).await;

    Ok(BulkOutcome {
        created,
        skipped_user_ids,
    })
}

pub async fn user_direct_trades(pool: &PgPool, user_id: Uuid) -> ServiceResult<UserDirectTrades> {
    let user = user_repo::get_user(pool, user_id)
        .await?
        .ok_or(TradeError::UserNotFound)?;
    let trades = trade_repo::list_user_direct_trades(pool, user_id).await?;

    let closed_count = trades.iter().filter(|t| t.is_closed()).count();

    Ok(UserDirectTrades {
        user_id,
        name: user.display_name(),
        email: user.email,
        open_count: trades.len() - closed_count,
        closed_count,
        trades,
    })
}

async fn insert_for_user(
    tx: &mut Transaction<'_, Postgres>,
    user: &User,
    valid: &ValidTrade,
) -> ServiceResult<(TradeOutcome, Vec<NotificationDraft>)> {
    let trade = trade_repo::insert_trade(
        &mut **tx,
        None,
        Some(user.id),
        valid,
        &direct_trade_reference(user.id),
    )
    .await?;

    if !trade.is_closed() {
        return Ok((
            TradeOutcome {
                trade,
                settlement: SettlementStatus::Pending,
                entries: Vec::new(),
                notified: 0,
            },
            Vec::new(),
        ));
    }

    let settled = settle_in_tx(tx, &trade, Utc::now()).await?;
    Ok((
        TradeOutcome {
            trade: settled.trade,
            settlement: SettlementStatus::Settled,
            entries: settled.entries,
            notified: 0,
        },
        settled.drafts,
    ))
}

/// Post-commit bookkeeping: metrics, logs, notifications.
async fn finish(
    notifier: &Notifier,
    staged: Vec<(TradeOutcome, Vec<NotificationDraft>)>,
) -> Vec<TradeOutcome> {
    let mut outcomes = Vec::with_capacity(staged.len());
    for (mut outcome, drafts) in staged {
        metrics::counter!("trades_recorded_total", "kind" => "direct").increment(1);
        if outcome.settlement == SettlementStatus::Settled {
            record_settlement_metrics(&outcome.entries);
        }
        tracing::info!(
            trade_id = %outcome.trade.id,
            user_id = ?outcome.trade.user_id,
            reference = %outcome.trade.reference,
            status = %outcome.trade.status,
            credited = outcome.entries.len(),
            "Direct trade recorded"
        );
        outcome.notified = notifier.send_all(&drafts).await;
        outcomes.push(outcome);
    }
    outcomes
}
