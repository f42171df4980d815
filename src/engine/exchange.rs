//! Economy exchange: spending gold on game time.
//!
//! The only currency sink in the engine. Hard caps and pricing follow the
//! reward rules: at most [`GAME_TIME_MAX_HOURS`] per call, at
//! [`GOLD_PER_GAME_TIME_HOUR`] gold per hour. The debit itself goes
//! through the account mutator so the spend is ledgered atomically with
//! the balance change.

use crate::engine::errors::EngineError;

/// Upper bound on game-time hours per exchange call.
pub const GAME_TIME_MAX_HOURS: u64 = 4;

/// Gold cost of one hour of game time.
pub const GOLD_PER_GAME_TIME_HOUR: u64 = 30;

/// Result of a successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub hours: u64,
    pub gold_spent: u64,
    pub remaining_gold: u64,
}

/// Validate the requested hours and return the gold cost.
pub fn validate_exchange(hours: u64) -> Result<u64, EngineError> {
    if hours == 0 || hours > GAME_TIME_MAX_HOURS {
        return Err(EngineError::InvalidInput(format!(
            "game time must be between 1 and {} hours, got {}",
            GAME_TIME_MAX_HOURS, hours
        )));
    }
    Ok(hours * GOLD_PER_GAME_TIME_HOUR)
}
