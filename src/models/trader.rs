use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for traders table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trader {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub category: String,
    pub bio: String,
    pub min_account_threshold: Decimal,
    /// Denormalized count of active relationships. Maintained in the same
    /// transaction as every relationship transition; see `recount_copiers`.
    pub copiers: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
