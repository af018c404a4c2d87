use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Trader;

/// Active traders, optionally filtered by name/username substring and category.
pub async fn list_active<'e, E>(
    exec: E,
    search: Option<&str>,
    category: Option<&str>,
) -> anyhow::Result<Vec<Trader>>
where
    E: PgExecutor<'e>,
{
    let traders = sqlx::query_as::<_, Trader>(
        r#"
        SELECT * FROM traders
        WHERE is_active = true
          AND ($1::text IS NULL OR strpos(lower(name), lower($1)) > 0 OR strpos(lower(username), lower($1)) > 0)
          AND ($2::text IS NULL OR category = $2)
        ORDER BY copiers DESC, name
        "#,
    )
    .bind(search)
    .bind(category)
    .fetch_all(exec)
    .await?;

    Ok(traders)
}

pub async fn get_trader<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trader>>
where
    E: PgExecutor<'e>,
{
    let trader = sqlx::query_as::<_, Trader>("SELECT * FROM traders WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(trader)
}

/// Exclusive lock: every relationship transition for this trader runs
/// behind it, so the copiers counter has a single writer.
pub async fn lock_trader<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trader>>
where
    E: PgExecutor<'e>,
{
    let trader = sqlx::query_as::<_, Trader>("SELECT * FROM traders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(trader)
}

/// Shared lock held by settlement: blocks joins/unlinks for the trader
/// while its copier set is being credited, but not other settlements.
pub async fn share_lock_trader<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trader>>
where
    E: PgExecutor<'e>,
{
    let trader = sqlx::query_as::<_, Trader>("SELECT * FROM traders WHERE id = $1 FOR SHARE")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(trader)
}

pub async fn set_copiers<'e, E>(exec: E, id: Uuid, copiers: i32) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE traders SET copiers = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(copiers)
        .execute(exec)
        .await?;

    Ok(())
}

/// Recompute the denormalized counter from relationship rows.
pub async fn recount_copiers<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trader>>
where
    E: PgExecutor<'e>,
{
    let trader = sqlx::query_as::<_, Trader>(
        r#"
        UPDATE traders
        SET copiers = (
                SELECT COUNT(*)::int FROM copy_relationships
                WHERE trader_id = $1 AND is_actively_copying = true
            ),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(trader)
}
