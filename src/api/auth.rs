use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::user_repo;
use crate::errors::AppError;
use crate::AppState;

/// Header carrying the authenticated user id, set by the session gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, injected into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub balance: Decimal,
    pub profit: Decimal,
    pub is_staff: bool,
}

/// Gateway authentication middleware.
///
/// If `API_TOKEN` is set, every request must carry
/// `Authorization: Bearer <token>` matching that value. If it is unset the
/// bearer check is skipped (dev mode). In both cases the caller is resolved
/// from `X-User-Id` and must be an active user.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(expected) = state.config.api_token.as_deref() {
        let token = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if token != Some(expected) {
            return AppError::Unauthorized.into_response();
        }
    }

    let Some(user_id) = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
    else {
        return AppError::Unauthorized.into_response();
    };

    let user = match user_repo::get_user(&state.db, user_id).await {
        Ok(Some(user)) if user.is_active => user,
        Ok(_) => {
            tracing::debug!(user_id = %user_id, "Unknown or inactive user");
            return AppError::Unauthorized.into_response();
        }
        Err(e) => return AppError::Internal(e).into_response(),
    };

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        balance: user.balance,
        profit: user.profit,
        is_staff: user.is_staff,
    });

    next.run(req).await
}

/// Staff-only gate. Must run after [`require_auth`].
pub async fn require_staff(req: Request, next: Next) -> Response {
    match req.extensions().get::<CurrentUser>() {
        Some(user) if user.is_staff => next.run(req).await,
        Some(user) => {
            tracing::warn!(user_id = %user.id, path = %req.uri().path(), "Admin route denied");
            AppError::Forbidden("Admin access required".into()).into_response()
        }
        None => AppError::Unauthorized.into_response(),
    }
}
