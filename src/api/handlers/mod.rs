pub mod admin_copies;
pub mod admin_trades;
pub mod copy;
pub mod direct_trades;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod traders;

use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::TradeStatus;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Data payload for actions that report a human-readable outcome.
#[derive(Serialize)]
pub struct ActionResult<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub result: T,
}

/// Optional `status` query filter; blank means no filter.
pub(crate) fn parse_status(raw: Option<&str>) -> Result<Option<&'static str>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => TradeStatus::from_api_str(s)
            .map(|st| Some(st.as_str()))
            .ok_or_else(|| AppError::BadRequest(format!("invalid status '{s}': expected open or closed"))),
    }
}
