use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_status, ActionResult, ApiResponse};
use crate::db::trade_repo::TradeFilter;
use crate::errors::AppError;
use crate::ledger::TradeInput;
use crate::models::Trade;
use crate::services::trade_service::{self, TradeDetail, TradeOutcome, DEFAULT_PAGE_SIZE};
use crate::services::Page;
use crate::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TradeListQuery {
    pub trader_id: Option<Uuid>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateTradeRequest {
    pub trader_id: Uuid,
    #[serde(flatten)]
    pub trade: TradeInput,
}

#[derive(Serialize)]
pub struct DeletedTrade {
    pub trade: Trade,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/admin/trades: trader trades, newest first
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<TradeListQuery>,
) -> Result<Json<ApiResponse<Page<Trade>>>, AppError> {
    let filter = TradeFilter {
        trader_id: q.trader_id,
        status: parse_status(q.status.as_deref())?,
        search: q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    };

    let page = trade_service::list_trades(
        &state.db,
        &filter,
        q.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        q.offset.unwrap_or(0),
    )
    .await?;

    Ok(ApiResponse::ok(page))
}

/// POST /api/admin/trades: record a trader trade; closed trades settle
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateTradeRequest>,
) -> Result<Json<ApiResponse<ActionResult<TradeOutcome>>>, AppError> {
    let outcome =
        trade_service::record_trade(&state.db, &state.notifier, body.trader_id, &body.trade).await?;
    let message = format!(
        "Trade {} recorded. Notified {} copying users.",
        outcome.trade.reference, outcome.notified
    );

    Ok(ApiResponse::ok(ActionResult {
        message,
        result: outcome,
    }))
}

/// GET /api/admin/trades/:id: detail with per-copier P/L
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TradeDetail>>, AppError> {
    let detail = trade_service::trade_detail(&state.db, id).await?;
    Ok(ApiResponse::ok(detail))
}

/// PUT /api/admin/trades/:id: edit; settles on first close
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TradeInput>,
) -> Result<Json<ApiResponse<TradeOutcome>>, AppError> {
    let outcome = trade_service::update_trade(&state.db, &state.notifier, id, &body).await?;
    Ok(ApiResponse::ok(outcome))
}

/// DELETE /api/admin/trades/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedTrade>>, AppError> {
    let trade = trade_service::delete_trade(&state.db, id).await?;
    Ok(ApiResponse::ok(DeletedTrade { trade }))
}
