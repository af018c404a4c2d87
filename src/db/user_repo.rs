use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::User;

pub async fn get_user<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<User>>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(user)
}

/// Row-lock a user for the rest of the transaction.
pub async fn lock_user<'e, E>(exec: E, id: Uuid) -> anyhow::Result<Option<User>>
where
    E: PgExecutor<'e>,
{
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(exec)
        .await?;

    Ok(user)
}

/// Active users among `ids`; unknown or inactive ids are dropped.
pub async fn get_active_users<'e, E>(exec: E, ids: &[Uuid]) -> anyhow::Result<Vec<User>>
where
    E: PgExecutor<'e>,
{
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = ANY($1) AND is_active = true ORDER BY email",
    )
    .bind(ids)
    .fetch_all(exec)
    .await?;

    Ok(users)
}

/// Add a settlement result to both balance and profit, in place.
pub async fn credit_balance_and_profit<'e, E>(
    exec: E,
    id: Uuid,
    amount: Decimal,
) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE users SET balance = balance + $2, profit = profit + $2 WHERE id = $1")
        .bind(id)
        .bind(amount)
        .execute(exec)
        .await?;

    Ok(())
}

/// Add a result to profit only (direct trades).
pub async fn credit_profit<'e, E>(exec: E, id: Uuid, amount: Decimal) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE users SET profit = profit + $2 WHERE id = $1")
        .bind(id)
        .bind(amount)
        .execute(exec)
        .await?;

    Ok(())
}
