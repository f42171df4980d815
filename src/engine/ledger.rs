//! Reward ledger helpers: canonical reason strings, daily aggregation, and
//! the replay audit.
//!
//! The ledger is the complete history of every grant and spend. Live user
//! balances are a cached projection of it; [`replay_balances`] recomputes
//! that projection from scratch so audits and tests can prove the two
//! never drift.

use chrono::NaiveDate;

use crate::engine::errors::EngineError;
use crate::storage::Store;
use crate::types::RewardKind;

/// Reason recorded for study-session grants.
pub fn study_reason(subject: &str, minutes: u64) -> String {
    format!("Studied {} for {} min", subject, minutes)
}

/// Reason recorded for quest completion grants.
pub fn quest_reason(title: &str) -> String {
    format!("Completed quest: {}", title)
}

/// Reason recorded for the per-boundary level-up bonus.
pub fn level_up_reason(level: u32) -> String {
    format!("Reached level {}", level)
}

/// Reason recorded for game-time exchanges.
pub fn exchange_reason(hours: u64) -> String {
    format!("Exchanged {} hour(s) of game time", hours)
}

/// Reason recorded for the registration grant.
pub fn registration_reason() -> String {
    "Starting balance".to_string()
}

/// Sum of a user's ledger entries of one kind on one UTC calendar day.
pub fn daily_totals<S: Store + ?Sized>(
    store: &S,
    user_id: u64,
    kind: RewardKind,
    date: NaiveDate,
) -> Result<i64, EngineError> {
    store.sum_ledger_by_kind_and_date(user_id, kind, date)
}

/// Balances derived by replaying a user's full ledger from account
/// creation: `(experience, gold)`.
///
/// Experience replays from Experience entries; gold from Gold and
/// Exchange entries (spends are negative, so plain summation works).
/// Item entries carry no balance.
pub fn replay_balances<S: Store + ?Sized>(
    store: &S,
    user_id: u64,
) -> Result<(u64, u64), EngineError> {
    let mut experience = 0i64;
    let mut gold = 0i64;
    for entry in store.ledger_for_user(user_id, usize::MAX)? {
        match entry.kind {
            RewardKind::Experience => experience += entry.amount,
            RewardKind::Gold | RewardKind::Exchange => gold += entry.amount,
            RewardKind::Item => {}
        }
    }
    Ok((experience.max(0) as u64, gold.max(0) as u64))
}
