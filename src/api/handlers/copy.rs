use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_status, ActionResult, ApiResponse};
use crate::api::auth::CurrentUser;
use crate::db::trade_repo::TradeFilter;
use crate::errors::AppError;
use crate::ledger::CopyState;
use crate::models::{CopierRow, CopyRelationship};
use crate::services::trade_service::{self, UserTradeView, DEFAULT_PAGE_SIZE};
use crate::services::{copy_service, Page};
use crate::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CopyRequest {
    pub trader_id: Uuid,
    pub action: String,
}

#[derive(Serialize)]
pub struct RelationshipBody {
    pub relationship: CopyRelationship,
}

#[derive(Serialize)]
pub struct CopyStatus {
    pub state: CopyState,
    pub is_copying: bool,
    pub cancel_requested: bool,
}

#[derive(Deserialize)]
pub struct CopyTradesQuery {
    pub status: Option<String>,
    pub trader_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/copy: start copying or ask to stop
pub async fn copy_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CopyRequest>,
) -> Result<Json<ApiResponse<ActionResult<RelationshipBody>>>, AppError> {
    match body.action.trim().to_lowercase().as_str() {
        "copy" => {
            let (rel, trader) =
                copy_service::join(&state.db, &state.notifier, user.id, body.trader_id).await?;
            Ok(ApiResponse::ok(ActionResult {
                message: format!("You are now copying {}", trader.name),
                result: RelationshipBody { relationship: rel },
            }))
        }
        "cancel" => {
            let rel = copy_service::request_leave(&state.db, user.id, body.trader_id).await?;
            Ok(ApiResponse::ok(ActionResult {
                message: "Cancel request sent. You will be notified once your request has been processed."
                    .into(),
                result: RelationshipBody { relationship: rel },
            }))
        }
        other => Err(AppError::BadRequest(format!(
            "invalid action '{other}': expected copy or cancel"
        ))),
    }
}

/// GET /api/copy/status/:trader_id
pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(trader_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CopyStatus>>, AppError> {
    let copy_state = copy_service::copy_state(&state.db, user.id, trader_id).await?;

    Ok(ApiResponse::ok(CopyStatus {
        state: copy_state,
        is_copying: copy_state.is_copying(),
        cancel_requested: copy_state == CopyState::CancelPending,
    }))
}

/// GET /api/copy/following: traders the caller copies
pub async fn following(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CopierRow>>>, AppError> {
    let rows = copy_service::following(&state.db, user.id).await?;
    Ok(ApiResponse::ok(rows))
}

/// GET /api/copy/trades: caller's copy trade history with personal P/L
pub async fn trades(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(q): Query<CopyTradesQuery>,
) -> Result<Json<ApiResponse<Page<UserTradeView>>>, AppError> {
    let status = parse_status(q.status.as_deref())?;
    let filter = TradeFilter {
        trader_id: q.trader_id,
        status,
        search: None,
    };

    let page = trade_service::user_trade_history(
        &state.db,
        user.id,
        &filter,
        q.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        q.offset.unwrap_or(0),
    )
    .await?;

    Ok(ApiResponse::ok(page))
}
