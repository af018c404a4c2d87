use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{CopyRelationship, Trader};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle of a (user, trader) copy relationship.
///
/// ```text
/// NONE ──copy──▶ ACTIVE ──cancel──▶ CANCEL_PENDING ──accept──▶ STOPPED
///                  ▲  │                  │                      │
///                  │  └─────unlink───────┼──────────────────────▶│
///                  └───────reject────────┘                      │
///                  ◀──────────────────copy (row reused)─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    None,
    Active,
    CancelPending,
    Stopped,
}

impl CopyState {
    pub fn of(rel: Option<&CopyRelationship>) -> Self {
        match rel {
            None => CopyState::None,
            Some(r) if !r.is_actively_copying => CopyState::Stopped,
            Some(r) if r.cancel_requested => CopyState::CancelPending,
            Some(_) => CopyState::Active,
        }
    }

    /// Active and cancel-pending relationships both count as copiers and both
    /// receive settlements.
    pub fn is_copying(&self) -> bool {
        matches!(self, CopyState::Active | CopyState::CancelPending)
    }
}

impl fmt::Display for CopyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyState::None => write!(f, "none"),
            CopyState::Active => write!(f, "active"),
            CopyState::CancelPending => write!(f, "cancel_pending"),
            CopyState::Stopped => write!(f, "stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejections of a copy-workflow action. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyError {
    #[error("Trader not found")]
    TraderNotFound,

    #[error("Copy relationship not found")]
    RelationshipNotFound,

    #[error("{0} is not accepting new copiers")]
    TraderInactive(String),

    #[error("You are already copying {0}")]
    AlreadyCopying(String),

    #[error("Insufficient balance. You need at least ${required} to copy {trader}. Your balance: ${balance}")]
    InsufficientBalance {
        trader: String,
        required: Decimal,
        balance: Decimal,
    },

    #[error("You are not copying {0}")]
    NotCopying(String),

    #[error("You have already requested to cancel copying {0}. Awaiting admin approval.")]
    CancelAlreadyRequested(String),

    #[error("No cancel request found for this relationship")]
    NoPendingCancel,

    #[error("Relationship is not active")]
    NotActive,
}

impl CopyError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CopyError::TraderNotFound | CopyError::RelationshipNotFound)
    }
}

// ---------------------------------------------------------------------------
// Admin decision on a cancel request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Some(Resolution::Accept),
            "reject" => Some(Resolution::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Accept => "accept",
            Resolution::Reject => "reject",
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Outcome of a successful transition. `copiers_delta` is what the caller
/// must apply to the trader's counter in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CopyState,
    pub to: CopyState,
    pub copiers_delta: i32,
}

/// NONE/STOPPED → ACTIVE.
///
/// Reuses `existing` when present (the row is never recreated) and snapshots
/// the user's current balance as the capital base.
pub fn start_copying(
    existing: Option<CopyRelationship>,
    trader: &Trader,
    user_id: Uuid,
    balance: Decimal,
    now: DateTime<Utc>,
) -> Result<(CopyRelationship, Transition), CopyError> {
    if !trader.is_active {
        return Err(CopyError::TraderInactive(trader.name.clone()));
    }

    let from = CopyState::of(existing.as_ref());
    if from.is_copying() {
        return Err(CopyError::AlreadyCopying(trader.name.clone()));
    }

    if balance < trader.min_account_threshold {
        return Err(CopyError::InsufficientBalance {
            trader: trader.name.clone(),
            required: trader.min_account_threshold,
            balance,
        });
    }

    let mut rel = existing.unwrap_or_else(|| CopyRelationship {
        id: Uuid::new_v4(),
        user_id,
        trader_id: trader.id,
        is_actively_copying: false,
        initial_investment_amount: None,
        minimum_threshold_at_start: None,
        cancel_requested: false,
        cancel_requested_at: None,
        started_copying_at: now,
        stopped_copying_at: None,
    });

    rel.is_actively_copying = true;
    rel.initial_investment_amount = Some(balance);
    rel.minimum_threshold_at_start = Some(trader.min_account_threshold);
    rel.cancel_requested = false;
    rel.cancel_requested_at = None;
    rel.started_copying_at = now;
    rel.stopped_copying_at = None;

    Ok((
        rel,
        Transition {
            from,
            to: CopyState::Active,
            copiers_delta: 1,
        },
    ))
}

/// ACTIVE → CANCEL_PENDING, initiated by the copying user.
pub fn request_cancel(
    rel: &mut CopyRelationship,
    trader_name: &str,
    now: DateTime<Utc>,
) -> Result<Transition, CopyError> {
    match CopyState::of(Some(&*rel)) {
        CopyState::Active => {}
        CopyState::CancelPending => {
            return Err(CopyError::CancelAlreadyRequested(trader_name.to_string()))
        }
        CopyState::None | CopyState::Stopped => {
            return Err(CopyError::NotCopying(trader_name.to_string()))
        }
    }

    rel.cancel_requested = true;
    rel.cancel_requested_at = Some(now);

    Ok(Transition {
        from: CopyState::Active,
        to: CopyState::CancelPending,
        copiers_delta: 0,
    })
}

/// CANCEL_PENDING → STOPPED (accept) or CANCEL_PENDING → ACTIVE (reject).
pub fn resolve_cancel(
    rel: &mut CopyRelationship,
    resolution: Resolution,
    now: DateTime<Utc>,
) -> Result<Transition, CopyError> {
    if CopyState::of(Some(&*rel)) != CopyState::CancelPending {
        return Err(CopyError::NoPendingCancel);
    }

    match resolution {
        Resolution::Accept => Ok(stop(rel, CopyState::CancelPending, now)),
        Resolution::Reject => {
            rel.cancel_requested = false;
            rel.cancel_requested_at = None;
            Ok(Transition {
                from: CopyState::CancelPending,
                to: CopyState::Active,
                copiers_delta: 0,
            })
        }
    }
}

/// ACTIVE/CANCEL_PENDING → STOPPED by an admin, no request needed.
pub fn unlink(rel: &mut CopyRelationship, now: DateTime<Utc>) -> Result<Transition, CopyError> {
    let from = CopyState::of(Some(&*rel));
    if !from.is_copying() {
        return Err(CopyError::NotActive);
    }
    Ok(stop(rel, from, now))
}

fn stop(rel: &mut CopyRelationship, from: CopyState, now: DateTime<Utc>) -> Transition {
    rel.is_actively_copying = false;
    rel.cancel_requested = false;
    rel.stopped_copying_at = Some(now);

    Transition {
        from,
        to: CopyState::Stopped,
        copiers_delta: -1,
    }
}

/// Apply a transition's delta to the denormalized counter, never below zero.
pub fn apply_copiers_delta(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn trader(threshold: i64) -> Trader {
        Trader {
            id: Uuid::new_v4(),
            name: "Ava Stone".into(),
            username: "avastone".into(),
            category: "crypto".into(),
            bio: String::new(),
            min_account_threshold: Decimal::from(threshold),
            copiers: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn joined(trader: &Trader, balance: i64) -> CopyRelationship {
        let (rel, _) = start_copying(None, trader, Uuid::new_v4(), Decimal::from(balance), Utc::now())
            .expect("join should succeed");
        rel
    }

    #[test]
    fn test_join_snapshots_balance_and_threshold() {
        let t = trader(500);
        let user_id = Uuid::new_v4();
        let (rel, tr) = start_copying(None, &t, user_id, Decimal::from(1_000), Utc::now()).unwrap();

        assert_eq!(tr.from, CopyState::None);
        assert_eq!(tr.to, CopyState::Active);
        assert_eq!(tr.copiers_delta, 1);
        assert_eq!(rel.user_id, user_id);
        assert_eq!(rel.trader_id, t.id);
        assert!(rel.is_actively_copying);
        assert_eq!(rel.initial_investment_amount, Some(Decimal::from(1_000)));
        assert_eq!(rel.minimum_threshold_at_start, Some(Decimal::from(500)));
    }

    #[test]
    fn test_join_below_threshold_rejected() {
        let t = trader(500);
        let err = start_copying(None, &t, Uuid::new_v4(), Decimal::new(49999, 2), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            CopyError::InsufficientBalance {
                trader: "Ava Stone".into(),
                required: Decimal::from(500),
                balance: Decimal::new(49999, 2),
            }
        );
        assert!(err.to_string().starts_with("Insufficient balance. You need at least $500"));
    }

    #[test]
    fn test_join_at_exact_threshold_allowed() {
        let t = trader(500);
        assert!(start_copying(None, &t, Uuid::new_v4(), Decimal::from(500), Utc::now()).is_ok());
    }

    #[test]
    fn test_join_inactive_trader_rejected() {
        let mut t = trader(0);
        t.is_active = false;
        let err = start_copying(None, &t, Uuid::new_v4(), Decimal::from(10), Utc::now()).unwrap_err();
        assert_eq!(err, CopyError::TraderInactive("Ava Stone".into()));
    }

    #[test]
    fn test_join_while_active_or_pending_is_already_copying() {
        let t = trader(100);
        let rel = joined(&t, 1_000);
        let err = start_copying(Some(rel.clone()), &t, rel.user_id, Decimal::from(1_000), Utc::now())
            .unwrap_err();
        assert_eq!(err, CopyError::AlreadyCopying("Ava Stone".into()));

        // Still "already copying" while cancel-pending, even if balance dropped
        let mut pending = rel;
        request_cancel(&mut pending, &t.name, Utc::now()).unwrap();
        let err = start_copying(Some(pending.clone()), &t, pending.user_id, Decimal::ONE, Utc::now())
            .unwrap_err();
        assert_eq!(err, CopyError::AlreadyCopying("Ava Stone".into()));
    }

    #[test]
    fn test_rejoin_reuses_row_and_resnapshots() {
        let t = trader(100);
        let mut rel = joined(&t, 1_000);
        let original_id = rel.id;
        unlink(&mut rel, Utc::now()).unwrap();

        let (rejoined, tr) =
            start_copying(Some(rel), &t, Uuid::new_v4(), Decimal::from(750), Utc::now()).unwrap();
        assert_eq!(tr.from, CopyState::Stopped);
        assert_eq!(tr.copiers_delta, 1);
        assert_eq!(rejoined.id, original_id);
        assert_eq!(rejoined.initial_investment_amount, Some(Decimal::from(750)));
        assert!(rejoined.stopped_copying_at.is_none());
    }

    #[test]
    fn test_cancel_request_twice_fails_and_keeps_state() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        let tr = request_cancel(&mut rel, &t.name, Utc::now()).unwrap();
        assert_eq!(tr.to, CopyState::CancelPending);
        let first_requested_at = rel.cancel_requested_at;

        let err = request_cancel(&mut rel, &t.name, Utc::now()).unwrap_err();
        assert_eq!(err, CopyError::CancelAlreadyRequested("Ava Stone".into()));
        assert!(rel.cancel_requested);
        assert_eq!(rel.cancel_requested_at, first_requested_at);
    }

    #[test]
    fn test_cancel_request_when_not_copying() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        unlink(&mut rel, Utc::now()).unwrap();
        let err = request_cancel(&mut rel, &t.name, Utc::now()).unwrap_err();
        assert_eq!(err, CopyError::NotCopying("Ava Stone".into()));
    }

    #[test]
    fn test_accept_stops_relationship() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        request_cancel(&mut rel, &t.name, Utc::now()).unwrap();

        let tr = resolve_cancel(&mut rel, Resolution::Accept, Utc::now()).unwrap();
        assert_eq!(tr.to, CopyState::Stopped);
        assert_eq!(tr.copiers_delta, -1);
        assert!(!rel.is_actively_copying);
        assert!(!rel.cancel_requested);
        assert!(rel.stopped_copying_at.is_some());
    }

    #[test]
    fn test_reject_keeps_relationship_active() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        request_cancel(&mut rel, &t.name, Utc::now()).unwrap();

        let tr = resolve_cancel(&mut rel, Resolution::Reject, Utc::now()).unwrap();
        assert_eq!(tr.to, CopyState::Active);
        assert_eq!(tr.copiers_delta, 0);
        assert!(rel.is_actively_copying);
        assert!(!rel.cancel_requested);
        assert!(rel.cancel_requested_at.is_none());
    }

    #[test]
    fn test_resolve_without_pending_request() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        for decision in [Resolution::Accept, Resolution::Reject] {
            let err = resolve_cancel(&mut rel, decision, Utc::now()).unwrap_err();
            assert_eq!(err, CopyError::NoPendingCancel);
        }
        assert!(rel.is_actively_copying);
    }

    #[test]
    fn test_unlink_active_and_pending() {
        let t = trader(0);
        let mut active = joined(&t, 100);
        assert_eq!(unlink(&mut active, Utc::now()).unwrap().from, CopyState::Active);

        let mut pending = joined(&t, 100);
        request_cancel(&mut pending, &t.name, Utc::now()).unwrap();
        let tr = unlink(&mut pending, Utc::now()).unwrap();
        assert_eq!(tr.from, CopyState::CancelPending);
        assert!(!pending.cancel_requested);
    }

    #[test]
    fn test_unlink_stopped_rejected() {
        let t = trader(0);
        let mut rel = joined(&t, 100);
        unlink(&mut rel, Utc::now()).unwrap();
        assert_eq!(unlink(&mut rel, Utc::now()).unwrap_err(), CopyError::NotActive);
    }

    #[test]
    fn test_copiers_counter_floored_at_zero() {
        assert_eq!(apply_copiers_delta(3, 1), 4);
        assert_eq!(apply_copiers_delta(1, -1), 0);
        assert_eq!(apply_copiers_delta(0, -1), 0);
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!(Resolution::from_api_str("ACCEPT"), Some(Resolution::Accept));
        assert_eq!(Resolution::from_api_str("reject"), Some(Resolution::Reject));
        assert_eq!(Resolution::from_api_str("approve"), None);
    }
}
