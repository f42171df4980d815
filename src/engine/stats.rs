//! Read-side projections: reward statistics and the leaderboard.
//!
//! Nothing here mutates state; these are plain reads over the user table
//! and the ledger.

use chrono::Utc;

use crate::engine::errors::EngineError;
use crate::engine::ledger::daily_totals;
use crate::engine::progression::{experience_to_next_level, level_progress_percent};
use crate::storage::Store;
use crate::types::RewardKind;

/// Snapshot of a user's progression and today's earnings.
#[derive(Debug, Clone)]
pub struct RewardStats {
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
    pub experience_to_next_level: u64,
    pub level_progress_percent: u64,
    pub today_experience: i64,
    pub today_gold: i64,
}

/// One row of the leaderboard projection.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub username: String,
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
}

/// Current balances plus today's ledger totals for one user.
pub fn reward_stats<S: Store + ?Sized>(
    store: &S,
    user_id: u64,
) -> Result<RewardStats, EngineError> {
    let user = store.get_user(user_id)?;
    let today = Utc::now().date_naive();
    Ok(RewardStats {
        level: user.level,
        experience: user.experience,
        gold: user.gold,
        experience_to_next_level: experience_to_next_level(user.level, user.experience),
        level_progress_percent: level_progress_percent(user.experience),
        today_experience: daily_totals(store, user_id, RewardKind::Experience, today)?,
        today_gold: daily_totals(store, user_id, RewardKind::Gold, today)?,
    })
}

/// Active users ranked by experience, highest first.
///
/// `subject` is accepted for API compatibility but not applied: there is
/// no per-subject experience association to filter on.
pub fn leaderboard<S: Store + ?Sized>(
    store: &S,
    _subject: Option<&str>,
    limit: usize,
) -> Result<Vec<LeaderboardRow>, EngineError> {
    let mut users = store.list_users()?;
    users.retain(|u| u.is_active);
    users.sort_by(|a, b| b.experience.cmp(&a.experience).then(a.id.cmp(&b.id)));
    Ok(users
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, user)| LeaderboardRow {
            rank: i + 1,
            username: user.username,
            level: user.level,
            experience: user.experience,
            gold: user.gold,
        })
        .collect())
}
