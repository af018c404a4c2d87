use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ActionResult, ApiResponse};
use crate::errors::AppError;
use crate::ledger::TradeInput;
use crate::services::direct_trade_service::{self, BulkOutcome, UserDirectTrades};
use crate::services::trade_service::TradeOutcome;
use crate::AppState;

#[derive(Deserialize)]
pub struct BulkTradeRequest {
    pub user_ids: Vec<Uuid>,
    pub trade: TradeInput,
}

/// GET /api/admin/users/:id/trades
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserDirectTrades>>, AppError> {
    let trades = direct_trade_service::user_direct_trades(&state.db, user_id).await?;
    Ok(ApiResponse::ok(trades))
}

/// POST /api/admin/users/:id/trades
pub async fn create_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<TradeInput>,
) -> Result<Json<ApiResponse<TradeOutcome>>, AppError> {
    let outcome =
        direct_trade_service::record_direct_trade(&state.db, &state.notifier, user_id, &body).await?;
    Ok(ApiResponse::ok(outcome))
}

/// POST /api/admin/direct-trades/bulk
pub async fn bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkTradeRequest>,
) -> Result<Json<ApiResponse<ActionResult<BulkOutcome>>>, AppError> {
    let outcome =
        direct_trade_service::bulk_direct_trades(&state.db, &state.notifier, &body.user_ids, &body.trade)
            .await?;
    let message = format!("Trade added for {} user(s) successfully.", outcome.created.len());

    Ok(ApiResponse::ok(ActionResult {
        message,
        result: outcome,
    }))
}
