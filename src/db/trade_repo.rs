use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::ledger::ValidTrade;
use crate::models::Trade;

/// Filters shared by the admin and user trade listings.
#[derive(Debug, Clone, Default)]
pub struct TradeFilter<'a> {
    pub trader_id: Option<Uuid>,
    pub status: Option<&'a str>,
    /// Substring of market, reference or trader name.
    pub search: Option<&'a str>,
}

/// Insert a trade owned by exactly one of `trader_id` / `user_id`.
pub async fn insert_trade<'e, E>(
    exec: E,
    trader_id: Option<Uuid>,
    user_id: Option<Uuid>,
    trade: &ValidTrade,
    reference: &str,
) -> anyhow::Result<Trade>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Trade>(
        r#"
        INSERT INTO trades (
            trader_id, user_id, market, direction, duration, amount, investment_amount,
            entry_price, exit_price, profit_loss_percent, status, reference, notes, closed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(trader_id)
    .bind(user_id)
    .bind(&trade.market)
    .bind(trade.direction.as_str())
    .bind(trade.duration)
    .bind(trade.amount)
    .bind(trade.investment_amount)
    .bind(trade.entry_price)
    .bind(trade.exit_price)
    .bind(trade.profit_loss_percent)
    .bind(trade.status.as_str())
    .bind(reference)
    .bind(&trade.notes)
    .bind(trade.closed_at)
    .fetch_one(exec)
    .await?;

    Ok(row)
}

pub async fn get_trade<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trade>>
where
    E: PgExecutor<'e>,
{
    let trade = sqlx::query_as::<_, Trade>("SELECT * FROM trades WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(trade)
}

pub async fn lock_trade<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<Trade>>
where
    E: PgExecutor<'e>,
{
    let trade = sqlx::query_as::<_, Trade>("SELECT * FROM trades WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(trade)
}

/// Overwrite the editable fields of a trade. Ownership, reference and
/// settlement state are left alone.
pub async fn update_trade<'e, E>(exec: E, id: Uuid, trade: &ValidTrade) -> anyhow::Result<Trade>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Trade>(
        r#"
        UPDATE trades
        SET market = $2,
            direction = $3,
            duration = $4,
            amount = $5,
            investment_amount = COALESCE($6, investment_amount),
            entry_price = $7,
            exit_price = $8,
            profit_loss_percent = $9,
            status = $10,
            notes = $11,
            closed_at = $12
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&trade.market)
    .bind(trade.direction.as_str())
    .bind(trade.duration)
    .bind(trade.amount)
    .bind(trade.investment_amount)
    .bind(trade.entry_price)
    .bind(trade.exit_price)
    .bind(trade.profit_loss_percent)
    .bind(trade.status.as_str())
    .bind(&trade.notes)
    .bind(trade.closed_at)
    .fetch_one(exec)
    .await?;

    Ok(row)
}

pub async fn mark_settled<'e, E>(exec: E, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<Trade>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Trade>(
        "UPDATE trades SET settled_at = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(at)
    .fetch_one(exec)
    .await?;

    Ok(row)
}

/// Returns whether a row was deleted.
pub async fn delete_trade<'e, E>(exec: E, id: Uuid) -> anyhow::Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM trades WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Trader trades
// ---------------------------------------------------------------------------

/// Trader trades (never direct ones), newest first.
pub async fn list_trader_trades<'e, E>(
    exec: E,
    filter: &TradeFilter<'_>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Trade>>
where
    E: PgExecutor<'e>,
{
    let trades = sqlx::query_as::<_, Trade>(
        r#"
        SELECT * FROM trades
        WHERE trader_id IS NOT NULL
          AND ($1::uuid IS NULL OR trader_id = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR strpos(lower(market), lower($3)) > 0 OR strpos(lower(reference), lower($3)) > 0
               OR EXISTS (SELECT 1 FROM traders tr WHERE tr.id = trades.trader_id AND strpos(lower(tr.name), lower($3)) > 0))
        ORDER BY opened_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(filter.trader_id)
    .bind(filter.status)
    .bind(filter.search)
    .bind(limit)
    .bind(offset)
    .fetch_all(exec)
    .await?;

    Ok(trades)
}

pub async fn count_trader_trades<'e, E>(exec: E, filter: &TradeFilter<'_>) -> anyhow::Result<i64>
where
    E: PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM trades
        WHERE trader_id IS NOT NULL
          AND ($1::uuid IS NULL OR trader_id = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR strpos(lower(market), lower($3)) > 0 OR strpos(lower(reference), lower($3)) > 0
               OR EXISTS (SELECT 1 FROM traders tr WHERE tr.id = trades.trader_id AND strpos(lower(tr.name), lower($3)) > 0))
        "#,
    )
    .bind(filter.trader_id)
    .bind(filter.status)
    .bind(filter.search)
    .fetch_one(exec)
    .await?;

    Ok(count)
}

/// Trades that reach a user through a copy relationship: settled while it
/// was active, or still unsettled on a relationship that is active now.
const COPIED_TRADES_WHERE: &str = r#"
    JOIN copy_relationships c ON c.trader_id = t.trader_id
    WHERE c.user_id = $1
      AND (
            (t.settled_at IS NULL AND c.is_actively_copying = true)
         OR (t.settled_at >= c.started_copying_at
             AND (c.is_actively_copying = true OR t.settled_at <= c.stopped_copying_at))
      )
      AND ($2::uuid IS NULL OR t.trader_id = $2)
      AND ($3::text IS NULL OR t.status = $3)
"#;

/// A copier's trade history, newest first.
pub async fn list_copied_trades<'e, E>(
    exec: E,
    user_id: Uuid,
    filter: &TradeFilter<'_>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Trade>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT t.* FROM trades t {COPIED_TRADES_WHERE} ORDER BY t.opened_at DESC LIMIT $4 OFFSET $5"
    );
    let trades = sqlx::query_as::<_, Trade>(&sql)
        .bind(user_id)
        .bind(filter.trader_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(exec)
        .await?;

    Ok(trades)
}

pub async fn count_copied_trades<'e, E>(
    exec: E,
    user_id: Uuid,
    filter: &TradeFilter<'_>,
) -> anyhow::Result<i64>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT COUNT(*) FROM trades t {COPIED_TRADES_WHERE}");
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(filter.trader_id)
        .bind(filter.status)
        .fetch_one(exec)
        .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// Direct user trades
// ---------------------------------------------------------------------------

pub async fn list_user_direct_trades<'e, E>(exec: E, user_id: Uuid) -> anyhow::Result<Vec<Trade>>
where
    E: PgExecutor<'e>,
{
    let trades = sqlx::query_as::<_, Trade>(
        "SELECT * FROM trades WHERE user_id = $1 ORDER BY opened_at DESC",
    )
    .bind(user_id)
    .fetch_all(exec)
    .await?;

    Ok(trades)
}
