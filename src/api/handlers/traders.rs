use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::db::trader_repo;
use crate::errors::AppError;
use crate::models::Trader;
use crate::AppState;

#[derive(Deserialize)]
pub struct TraderQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// GET /api/traders: active traders
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<TraderQuery>,
) -> Result<Json<ApiResponse<Vec<Trader>>>, AppError> {
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category = q.category.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let traders = trader_repo::list_active(&state.db, search, category).await?;
    Ok(ApiResponse::ok(traders))
}

/// GET /api/traders/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trader>>, AppError> {
    let trader = trader_repo::get_trader(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trader not found".into()))?;

    Ok(ApiResponse::ok(trader))
}
