pub mod copy_service;
pub mod direct_trade_service;
pub mod notifier;
pub mod trade_service;

use crate::ledger::{CopyError, SettlementError, TradeError};

/// Failure of a service operation: a domain rejection (no state changed)
/// or an infrastructure error.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Internal(e.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One page of a listing plus the unpaginated total.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
