//! Quest lifecycle state machine.
//!
//! Per (user, quest) the states run NotStarted → InProgress → Completed,
//! and Completed is terminal. Reward issuance is edge-triggered: it
//! happens at the single update where stored progress first crosses 100,
//! and never again, no matter how many later updates re-submit 100.
//!
//! The functions here cover starting and the pure update/trigger logic;
//! [`crate::engine::Engine::update_quest_progress`] wires the trigger to
//! the account mutator so the completion flag and its reward commit
//! together.

use chrono::Utc;
use log::info;

use crate::engine::errors::EngineError;
use crate::storage::Store;
use crate::types::UserQuestProgress;

/// Partial update to a progress record. Absent fields are left unchanged,
/// not reset. `time_spent_secs` is the caller-reported accumulated total.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub progress: Option<f64>,
    pub score: Option<u32>,
    pub time_spent_secs: Option<u64>,
}

/// Result of a quest start.
#[derive(Debug, Clone)]
pub struct QuestStartOutcome {
    pub attempts: u32,
    /// True when this call created the progress record.
    pub newly_started: bool,
    /// True when the quest was already completed; the start only counted
    /// the attempt.
    pub already_completed: bool,
}

/// Start (or re-enter) a quest for a user.
///
/// First start creates the record with one attempt. Re-starting an
/// unfinished quest bumps the attempt counter and leaves progress alone.
/// Re-starting a completed quest bumps attempts for analytics but can
/// never re-issue rewards. Safe to retry.
pub fn start_quest<S: Store + ?Sized>(
    store: &S,
    user_id: u64,
    quest_id: u64,
) -> Result<QuestStartOutcome, EngineError> {
    let quest = store.get_quest(quest_id)?;
    if !quest.is_active {
        return Err(EngineError::NotFound(format!(
            "quest {} is not active",
            quest_id
        )));
    }
    // Surfaces NotFound for unknown users before any write.
    let user = store.get_user(user_id)?;

    let outcome = match store.get_progress(user_id, quest_id)? {
        Some(mut record) => {
            record.attempts += 1;
            record.touch();
            let outcome = QuestStartOutcome {
                attempts: record.attempts,
                newly_started: false,
                already_completed: record.completed,
            };
            store.upsert_progress(&record)?;
            outcome
        }
        None => {
            let record = UserQuestProgress::start(user_id, quest_id);
            store.upsert_progress(&record)?;
            QuestStartOutcome {
                attempts: 1,
                newly_started: true,
                already_completed: false,
            }
        }
    };

    info!(
        "{} started quest '{}' (attempt {})",
        user.username, quest.title, outcome.attempts
    );
    Ok(outcome)
}

/// Reject malformed progress values before they touch stored state.
pub fn validate_update(update: &ProgressUpdate) -> Result<(), EngineError> {
    if let Some(value) = update.progress {
        if value.is_nan() || !(0.0..=100.0).contains(&value) {
            return Err(EngineError::InvalidInput(format!(
                "progress must be within 0.0..=100.0, got {}",
                value
            )));
        }
    }
    Ok(())
}

/// Apply a validated update to a progress record in place.
///
/// Returns true exactly when the completion edge fires: previous progress
/// below 100, new progress at or above it, record not already completed.
pub fn apply_update(record: &mut UserQuestProgress, update: &ProgressUpdate) -> bool {
    let previous = record.progress;

    if let Some(value) = update.progress {
        record.progress = value;
    }
    if let Some(score) = update.score {
        record.score = Some(score);
    }
    if let Some(secs) = update.time_spent_secs {
        record.time_spent_secs = secs;
    }
    record.touch();

    let triggered = !record.completed && previous < 100.0 && record.progress >= 100.0;
    if triggered {
        record.completed = true;
        record.completed_at = Some(Utc::now());
    }
    triggered
}
