use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{CopierRow, CopyRelationship};

const COPIER_SELECT: &str = r#"
    SELECT c.id, c.user_id,
           u.email AS user_email, u.first_name AS user_first_name, u.last_name AS user_last_name,
           c.trader_id, t.name AS trader_name,
           c.initial_investment_amount, c.cancel_requested, c.cancel_requested_at,
           c.started_copying_at
    FROM copy_relationships c
    INNER JOIN users u ON u.id = c.user_id
    INNER JOIN traders t ON t.id = c.trader_id
"#;

// ---------------------------------------------------------------------------
// Single relationship
// ---------------------------------------------------------------------------

pub async fn get_relationship<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<CopyRelationship>>
where
    E: PgExecutor<'e>,
{
    let rel = sqlx::query_as::<_, CopyRelationship>("SELECT * FROM copy_relationships WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(rel)
}

pub async fn lock_relationship<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<CopyRelationship>>
where
    E: PgExecutor<'e>,
{
    let rel = sqlx::query_as::<_, CopyRelationship>(
        "SELECT * FROM copy_relationships WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(rel)
}

/// The (user, trader) row in any state, locked.
pub async fn lock_for_pair<'e, E>(
    exec: E,
    user_id: Uuid,
    trader_id: Uuid,
) -> anyhow::Result<Option<CopyRelationship>>
where
    E: PgExecutor<'e>,
{
    let rel = sqlx::query_as::<_, CopyRelationship>(
        "SELECT * FROM copy_relationships WHERE user_id = $1 AND trader_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(trader_id)
    .fetch_optional(exec)
    .await?;

    Ok(rel)
}

pub async fn get_for_pair<'e, E>(
    exec: E,
    user_id: Uuid,
    trader_id: Uuid,
) -> anyhow::Result<Option<CopyRelationship>>
where
    E: PgExecutor<'e>,
{
    let rel = sqlx::query_as::<_, CopyRelationship>(
        "SELECT * FROM copy_relationships WHERE user_id = $1 AND trader_id = $2",
    )
    .bind(user_id)
    .bind(trader_id)
    .fetch_optional(exec)
    .await?;

    Ok(rel)
}

/// Insert or overwrite the full state of a relationship row.
pub async fn save_relationship<'e, E>(exec: E, rel: &CopyRelationship) -> anyhow::Result<CopyRelationship>
where
    E: PgExecutor<'e>,
{
    let saved = sqlx::query_as::<_, CopyRelationship>(
        r#"
        INSERT INTO copy_relationships (
            id, user_id, trader_id, is_actively_copying,
            initial_investment_amount, minimum_threshold_at_start,
            cancel_requested, cancel_requested_at, started_copying_at, stopped_copying_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            is_actively_copying = EXCLUDED.is_actively_copying,
            initial_investment_amount = EXCLUDED.initial_investment_amount,
            minimum_threshold_at_start = EXCLUDED.minimum_threshold_at_start,
            cancel_requested = EXCLUDED.cancel_requested,
            cancel_requested_at = EXCLUDED.cancel_requested_at,
            started_copying_at = EXCLUDED.started_copying_at,
            stopped_copying_at = EXCLUDED.stopped_copying_at
        RETURNING *
        "#,
    )
    .bind(rel.id)
    .bind(rel.user_id)
    .bind(rel.trader_id)
    .bind(rel.is_actively_copying)
    .bind(rel.initial_investment_amount)
    .bind(rel.minimum_threshold_at_start)
    .bind(rel.cancel_requested)
    .bind(rel.cancel_requested_at)
    .bind(rel.started_copying_at)
    .bind(rel.stopped_copying_at)
    .fetch_one(exec)
    .await?;

    Ok(saved)
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Copiers of a trader still copying, split by whether a cancel is pending.
pub async fn list_copiers<'e, E>(
    exec: E,
    trader_id: Uuid,
    cancel_requested: bool,
) -> anyhow::Result<Vec<CopierRow>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "{COPIER_SELECT} WHERE c.trader_id = $1 AND c.is_actively_copying = true AND c.cancel_requested = $2 \
         ORDER BY c.cancel_requested_at DESC NULLS LAST, c.started_copying_at DESC"
    );
    let rows = sqlx::query_as::<_, CopierRow>(&sql)
        .bind(trader_id)
        .bind(cancel_requested)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}

/// Every relationship still copying, across traders, for the admin overview.
/// `search` matches user email / first / last name and trader name.
pub async fn list_all_copiers<'e, E>(
    exec: E,
    cancel_requested: bool,
    trader_id: Option<Uuid>,
    search: Option<&str>,
) -> anyhow::Result<Vec<CopierRow>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "{COPIER_SELECT} WHERE c.is_actively_copying = true AND c.cancel_requested = $1 \
           AND ($2::uuid IS NULL OR c.trader_id = $2) \
           AND ($3::text IS NULL OR strpos(lower(u.email), lower($3)) > 0 \
                OR strpos(lower(u.first_name), lower($3)) > 0 \
                OR strpos(lower(u.last_name), lower($3)) > 0 \
                OR strpos(lower(t.name), lower($3)) > 0) \
         ORDER BY c.cancel_requested_at DESC NULLS LAST, c.started_copying_at DESC"
    );
    let rows = sqlx::query_as::<_, CopierRow>(&sql)
        .bind(cancel_requested)
        .bind(trader_id)
        .bind(search)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}

/// Settlement fan-out set: every relationship still copying the trader,
/// ordered by user id so concurrent settlements lock users in one order.
pub async fn copiers_for_settlement<'e, E>(exec: E, trader_id: Uuid) -> anyhow::Result<Vec<CopierRow>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "{COPIER_SELECT} WHERE c.trader_id = $1 AND c.is_actively_copying = true ORDER BY c.user_id"
    );
    let rows = sqlx::query_as::<_, CopierRow>(&sql)
        .bind(trader_id)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}

/// A user's relationships; `active_only` limits to ones still copying.
pub async fn list_for_user<'e, E>(
    exec: E,
    user_id: Uuid,
    active_only: bool,
) -> anyhow::Result<Vec<CopierRow>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "{COPIER_SELECT} WHERE c.user_id = $1 AND ($2 = false OR c.is_actively_copying = true) \
         ORDER BY c.started_copying_at DESC"
    );
    let rows = sqlx::query_as::<_, CopierRow>(&sql)
        .bind(user_id)
        .bind(active_only)
        .fetch_all(exec)
        .await?;

    Ok(rows)
}
