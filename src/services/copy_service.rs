use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::notifier::{self, Notifier};
use super::ServiceResult;
use crate::db::{copy_repo, trader_repo, user_repo};
use crate::ledger::state_machine::{self, apply_copiers_delta};
use crate::ledger::{CopyError, CopyState, Resolution};
use crate::models::{CopierRow, CopyRelationship, Trader, User};

/// Copiers of one trader, split the way the admin screens show them.
#[derive(Debug, Clone, Serialize)]
pub struct CopierLists {
    pub active_copiers: Vec<CopierRow>,
    pub cancel_requests: Vec<CopierRow>,
}

/// Result of an admin action on a relationship.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOutcome {
    pub relationship: CopyRelationship,
    pub trader: Trader,
    pub user_email: String,
}

// ---------------------------------------------------------------------------
// User actions
// ---------------------------------------------------------------------------

/// Start (or restart) copying a trader. Returns the relationship and the
/// trader with its updated counter.
///
/// Locks trader, user, then relationship; the counter moves in the same
/// transaction as the row.
pub async fn join(
    pool: &PgPool,
    notifier: &Notifier,
    user_id: Uuid,
    trader_id: Uuid,
) -> ServiceResult<(CopyRelationship, Trader)> {
    let mut tx = pool.begin().await?;

    let mut trader = trader_repo::lock_trader(&mut *tx, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    let user = require_user(user_repo::lock_user(&mut *tx, user_id).await?, user_id)?;
    let existing = copy_repo::lock_for_pair(&mut *tx, user_id, trader_id).await?;

    let (rel, transition) =
        state_machine::start_copying(existing, &trader, user_id, user.balance, Utc::now())?;

    let rel = copy_repo::save_relationship(&mut *tx, &rel).await?;
    let copiers = apply_copiers_delta(trader.copiers, transition.copiers_delta);
    trader_repo::set_copiers(&mut *tx, trader.id, copiers).await?;
    trader.copiers = copiers;

    tx.commit().await?;

    metrics::counter!("copy_joins_total").increment(1);
    tracing::info!(
        user_id = %user_id,
        trader_id = %trader_id,
        copy_id = %rel.id,
        from = %transition.from,
        initial_investment = %user.balance,
        copiers,
        "User started copying trader"
    );

    notifier
        .send(&notifier::format_copy_started(user_id, &trader.name, user.balance))
        .await;

    Ok((rel, trader))
}

/// Ask an admin to stop copying. The relationship keeps settling until the
/// request is accepted.
pub async fn request_leave(
    pool: &PgPool,
    user_id: Uuid,
    trader_id: Uuid,
) -> ServiceResult<CopyRelationship> {
    let mut tx = pool.begin().await?;

    let trader = trader_repo::lock_trader(&mut *tx, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    let mut rel = copy_repo::lock_for_pair(&mut *tx, user_id, trader_id)
        .await?
        .ok_or_else(|| CopyError::NotCopying(trader.name.clone()))?;

    state_machine::request_cancel(&mut rel, &trader.name, Utc::now())?;
    let rel = copy_repo::save_relationship(&mut *tx, &rel).await?;

    tx.commit().await?;

    metrics::counter!("copy_cancel_requests_total").increment(1);
    tracing::info!(
        user_id = %user_id,
        trader_id = %trader_id,
        copy_id = %rel.id,
        "Cancel request submitted"
    );

    Ok(rel)
}

pub async fn copy_state(pool: &PgPool, user_id: Uuid, trader_id: Uuid) -> ServiceResult<CopyState> {
    trader_repo::get_trader(pool, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    let rel = copy_repo::get_for_pair(pool, user_id, trader_id).await?;
    Ok(CopyState::of(rel.as_ref()))
}

/// Relationships the user is still copying, cancel-pending included.
pub async fn following(pool: &PgPool, user_id: Uuid) -> ServiceResult<Vec<CopierRow>> {
    Ok(copy_repo::list_for_user(pool, user_id, true).await?)
}

// ---------------------------------------------------------------------------
// Admin actions
// ---------------------------------------------------------------------------

/// Accept or reject a pending cancel request.
pub async fn admin_resolve(
    pool: &PgPool,
    notifier: &Notifier,
    copy_id: Uuid,
    resolution: Resolution,
) -> ServiceResult<AdminOutcome> {
    let mut tx = pool.begin().await?;
    let (trader, mut rel) = lock_trader_and_relationship(&mut tx, copy_id).await?;

    let transition = state_machine::resolve_cancel(&mut rel, resolution, Utc::now())?;
    let rel = copy_repo::save_relationship(&mut *tx, &rel).await?;
    let trader = apply_transition_to_trader(&mut tx, trader, transition.copiers_delta).await?;
    let user = require_user(user_repo::get_user(&mut *tx, rel.user_id).await?, rel.user_id)?;

    tx.commit().await?;

    metrics::counter!("copy_resolutions_total", "decision" => resolution.as_str()).increment(1);
    tracing::info!(
        copy_id = %copy_id,
        user_id = %rel.user_id,
        trader_id = %trader.id,
        decision = resolution.as_str(),
        copiers = trader.copiers,
        "Cancel request resolved"
    );

    let draft = match resolution {
        Resolution::Accept => notifier::format_cancel_accepted(rel.user_id, &trader.name),
        Resolution::Reject => notifier::format_cancel_rejected(rel.user_id, &trader.name),
    };
    notifier.send(&draft).await;

    Ok(AdminOutcome {
        relationship: rel,
        trader,
        user_email: user.email,
    })
}

/// Stop a relationship without a cancel request.
pub async fn admin_unlink(
    pool: &PgPool,
    notifier: &Notifier,
    copy_id: Uuid,
) -> ServiceResult<AdminOutcome> {
    let mut tx = pool.begin().await?;
    let (trader, mut rel) = lock_trader_and_relationship(&mut tx, copy_id).await?;

    let transition = state_machine::unlink(&mut rel, Utc::now())?;
    let rel = copy_repo::save_relationship(&mut *tx, &rel).await?;
    let trader = apply_transition_to_trader(&mut tx, trader, transition.copiers_delta).await?;
    let user = require_user(user_repo::get_user(&mut *tx, rel.user_id).await?, rel.user_id)?;

    tx.commit().await?;

    metrics::counter!("copy_unlinks_total").increment(1);
    tracing::info!(
        copy_id = %copy_id,
        user_id = %rel.user_id,
        trader_id = %trader.id,
        from = %transition.from,
        copiers = trader.copiers,
        "Relationship unlinked by admin"
    );

    notifier
        .send(&notifier::format_unlinked(rel.user_id, &trader.name))
        .await;

    Ok(AdminOutcome {
        relationship: rel,
        trader,
        user_email: user.email,
    })
}

pub async fn list_copiers(pool: &PgPool, trader_id: Uuid) -> ServiceResult<(Trader, CopierLists)> {
    let trader = trader_repo::get_trader(pool, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;

    let lists = CopierLists {
        active_copiers: copy_repo::list_copiers(pool, trader_id, false).await?,
        cancel_requests: copy_repo::list_copiers(pool, trader_id, true).await?,
    };

    Ok((trader, lists))
}

/// Every live relationship across traders.
pub async fn overview(
    pool: &PgPool,
    trader_id: Option<Uuid>,
    search: Option<&str>,
) -> ServiceResult<CopierLists> {
    Ok(CopierLists {
        active_copiers: copy_repo::list_all_copiers(pool, false, trader_id, search).await?,
        cancel_requests: copy_repo::list_all_copiers(pool, true, trader_id, search).await?,
    })
}

/// Rebuild the copiers counter from relationship rows.
pub async fn recount_copiers(pool: &PgPool, trader_id: Uuid) -> ServiceResult<Trader> {
    let mut tx = pool.begin().await?;
    let before = trader_repo::lock_trader(&mut *tx, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    let trader = trader_repo::recount_copiers(&mut *tx, trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    tx.commit().await?;

    if before.copiers != trader.copiers {
        tracing::warn!(
            trader_id = %trader_id,
            stored = before.copiers,
            actual = trader.copiers,
            "Copiers counter drift repaired"
        );
    }

    Ok(trader)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the relationship's trader, then lock trader before relationship
/// so every transition takes locks in the same order.
async fn lock_trader_and_relationship(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    copy_id: Uuid,
) -> ServiceResult<(Trader, CopyRelationship)> {
    let peek = copy_repo::get_relationship(&mut **tx, copy_id)
        .await?
        .ok_or(CopyError::RelationshipNotFound)?;
    let trader = trader_repo::lock_trader(&mut **tx, peek.trader_id)
        .await?
        .ok_or(CopyError::TraderNotFound)?;
    let rel = copy_repo::lock_relationship(&mut **tx, copy_id)
        .await?
        .ok_or(CopyError::RelationshipNotFound)?;
    Ok((trader, rel))
}

async fn apply_transition_to_trader(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    mut trader: Trader,
    delta: i32,
) -> ServiceResult<Trader> {
    if delta == 0 {
        return Ok(trader);
    }
    let copiers = apply_copiers_delta(trader.copiers, delta);
    if trader.copiers + delta < 0 {
        tracing::warn!(trader_id = %trader.id, stored = trader.copiers, "Copiers counter would go negative; floored at zero");
    }
    trader_repo::set_copiers(&mut **tx, trader.id, copiers).await?;
    trader.copiers = copiers;
    Ok(trader)
}

fn require_user(user: Option<User>, user_id: Uuid) -> ServiceResult<User> {
    user.ok_or_else(|| anyhow::anyhow!("user {user_id} not found").into())
}
