use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for copy_relationships table. One row per (user, trader)
/// pair; termination flips `is_actively_copying` and the row is reused on
/// re-join.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CopyRelationship {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trader_id: Uuid,
    pub is_actively_copying: bool,
    /// User balance captured at join time; the capital base for every
    /// settlement on this relationship.
    pub initial_investment_amount: Option<Decimal>,
    pub minimum_threshold_at_start: Option<Decimal>,
    pub cancel_requested: bool,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub started_copying_at: DateTime<Utc>,
    pub stopped_copying_at: Option<DateTime<Utc>>,
}

/// Relationship joined with its user and trader, for admin listings and
/// settlement fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CopierRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub trader_id: Uuid,
    pub trader_name: String,
    pub initial_investment_amount: Option<Decimal>,
    pub cancel_requested: bool,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub started_copying_at: DateTime<Utc>,
}

impl CopierRow {
    pub fn user_name(&self) -> String {
        let full = format!("{} {}", self.user_first_name, self.user_last_name);
        let full = full.trim();
        if full.is_empty() {
            self.user_email.clone()
        } else {
            full.to_string()
        }
    }
}
