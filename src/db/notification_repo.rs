use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Notification, NotificationDraft};

pub async fn insert_notification<'e, E>(
    exec: E,
    draft: &NotificationDraft,
) -> anyhow::Result<Notification>
where
    E: PgExecutor<'e>,
{
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, detail)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(draft.user_id)
    .bind(draft.kind.as_str())
    .bind(&draft.title)
    .bind(&draft.message)
    .bind(&draft.detail)
    .fetch_one(exec)
    .await?;

    Ok(notification)
}

/// Most recent notifications for a user, newest first.
pub async fn list_for_user<'e, E>(
    exec: E,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<Notification>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(exec)
    .await?;

    Ok(rows)
}
