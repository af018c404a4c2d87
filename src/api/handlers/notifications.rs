use axum::extract::State;
use axum::{Extension, Json};

use super::ApiResponse;
use crate::api::auth::CurrentUser;
use crate::db::notification_repo;
use crate::errors::AppError;
use crate::models::Notification;
use crate::AppState;

const MAX_NOTIFICATIONS: i64 = 100;

/// GET /api/notifications: caller's latest notifications
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AppError> {
    let rows = notification_repo::list_for_user(&state.db, user.id, MAX_NOTIFICATIONS).await?;
    Ok(ApiResponse::ok(rows))
}
