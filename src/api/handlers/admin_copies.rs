use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ActionResult, ApiResponse};
use crate::errors::AppError;
use crate::ledger::Resolution;
use crate::models::Trader;
use crate::services::copy_service::{self, AdminOutcome, CopierLists};
use crate::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TraderCopiers {
    pub trader: Trader,
    #[serde(flatten)]
    pub lists: CopierLists,
}

#[derive(Deserialize)]
pub struct OverviewQuery {
    pub trader_id: Option<Uuid>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub action: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/admin/traders/:id/copiers
pub async fn trader_copiers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TraderCopiers>>, AppError> {
    let (trader, lists) = copy_service::list_copiers(&state.db, id).await?;
    Ok(ApiResponse::ok(TraderCopiers { trader, lists }))
}

/// POST /api/admin/traders/:id/copiers/recount
pub async fn recount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trader>>, AppError> {
    let trader = copy_service::recount_copiers(&state.db, id).await?;
    Ok(ApiResponse::ok(trader))
}

/// GET /api/admin/copies: live relationships and pending cancel requests
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<ApiResponse<CopierLists>>, AppError> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let lists = copy_service::overview(&state.db, query.trader_id, search).await?;
    Ok(ApiResponse::ok(lists))
}

/// POST /api/admin/copies/:id/resolve: accept or reject a cancel request
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<ActionResult<AdminOutcome>>>, AppError> {
    let resolution = Resolution::from_api_str(&body.action).ok_or_else(|| {
        AppError::BadRequest("action (accept/reject) is required".into())
    })?;

    let outcome = copy_service::admin_resolve(&state.db, &state.notifier, id, resolution).await?;
    let message = match resolution {
        Resolution::Accept => format!(
            "Cancel request accepted. {} is no longer copying {}.",
            outcome.user_email, outcome.trader.name
        ),
        Resolution::Reject => format!(
            "Cancel request rejected. {} continues copying {}.",
            outcome.user_email, outcome.trader.name
        ),
    };

    Ok(ApiResponse::ok(ActionResult {
        message,
        result: outcome,
    }))
}

/// POST /api/admin/copies/:id/unlink
pub async fn unlink(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ActionResult<AdminOutcome>>>, AppError> {
    let outcome = copy_service::admin_unlink(&state.db, &state.notifier, id).await?;
    let message = format!(
        "Successfully unlinked {} from {}",
        outcome.user_email, outcome.trader.name
    );

    Ok(ApiResponse::ok(ActionResult {
        message,
        result: outcome,
    }))
}
