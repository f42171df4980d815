//! Account mutator: the single write path for balances, the derived level,
//! and the ledger.
//!
//! Every reward and spend in the engine funnels through [`apply_grants`].
//! It re-reads the authoritative user record, applies the whole delta
//! batch, recomputes the persisted level, adds the per-boundary level-up
//! bonus, and hands the store one [`AccountCommit`] so the user record and
//! its ledger entries land together or not at all. Callers must hold the
//! per-user lock (see [`crate::engine::Engine`]) so no other writer can
//! slip between the read and the commit.

use log::{debug, warn};
use uuid::Uuid;

use crate::engine::errors::EngineError;
use crate::engine::ledger::level_up_reason;
use crate::engine::progression::{level_from_experience, level_up_bonuses, LEVEL_UP_BONUS_GOLD};
use crate::storage::{AccountCommit, Store};
use crate::types::{RewardKind, RewardLedgerEntry, SessionReceipt, User, UserQuestProgress};

/// Bounded retries for transient commit conflicts before surfacing
/// [`EngineError::Conflict`].
const MAX_COMMIT_RETRIES: u32 = 3;

/// One requested balance change, before level bookkeeping.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub kind: RewardKind,
    /// Signed: positive grants, negative spends.
    pub amount: i64,
    pub reason: String,
    pub quest_id: Option<u64>,
}

impl GrantRequest {
    pub fn new(kind: RewardKind, amount: i64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            reason: reason.into(),
            quest_id: None,
        }
    }

    pub fn for_quest(mut self, quest_id: u64) -> Self {
        self.quest_id = Some(quest_id);
        self
    }
}

/// What a committed mutation did to the account.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    /// Post-commit user record.
    pub user: User,
    /// Ledger entries written, in commit order.
    pub entries: Vec<RewardLedgerEntry>,
    /// Level boundaries crossed by this update.
    pub levels_gained: u32,
    /// Gold added by level-up bonuses.
    pub bonus_gold: u64,
}

/// Apply a batch of grants/debits to one user as a single atomic unit.
///
/// Zero-amount requests are dropped rather than written as empty ledger
/// lines. Gold debits beyond the current balance fail with
/// `InsufficientBalance` before anything is written; experience is never
/// debited and a negative experience total is rejected as `InvalidInput`.
pub fn apply_grants<S: Store + ?Sized>(
    store: &S,
    user_id: u64,
    grants: &[GrantRequest],
    progress: Option<&UserQuestProgress>,
    session: Option<Uuid>,
) -> Result<AccountUpdate, EngineError> {
    let mut user = store.get_user(user_id)?;
    let old_experience = user.experience;

    let mut xp_delta = 0i64;
    let mut gold_delta = 0i64;
    for grant in grants {
        match grant.kind {
            RewardKind::Experience => xp_delta += grant.amount,
            RewardKind::Gold | RewardKind::Exchange => gold_delta += grant.amount,
            // Item grants are recorded but carry no balance.
            RewardKind::Item => {}
        }
    }

    let new_experience = old_experience as i64 + xp_delta;
    if new_experience < 0 {
        return Err(EngineError::InvalidInput(format!(
            "experience cannot go negative (delta {})",
            xp_delta
        )));
    }
    let new_experience = new_experience as u64;

    // Level bonuses are part of the same commit: every boundary crossed by
    // this batch pays out, however many there are.
    let crossed = level_up_bonuses(old_experience, new_experience);
    let bonus_gold = crossed.len() as u64 * LEVEL_UP_BONUS_GOLD;

    let new_gold = user.gold as i64 + gold_delta + bonus_gold as i64;
    if new_gold < 0 {
        return Err(EngineError::InsufficientBalance {
            required: (-gold_delta) as u64,
            available: user.gold,
        });
    }

    user.experience = new_experience;
    user.gold = new_gold as u64;
    user.level = level_from_experience(new_experience);
    user.touch();

    let mut entries = Vec::with_capacity(grants.len() + crossed.len());
    for grant in grants {
        if grant.amount == 0 {
            continue;
        }
        entries.push(RewardLedgerEntry::new(
            user_id,
            grant.kind,
            grant.amount,
            grant.reason.clone(),
            grant.quest_id,
        ));
    }
    for level in &crossed {
        entries.push(RewardLedgerEntry::new(
            user_id,
            RewardKind::Gold,
            LEVEL_UP_BONUS_GOLD as i64,
            level_up_reason(*level),
            None,
        ));
    }

    let receipt = session.map(|_| {
        SessionReceipt::new(
            xp_delta.max(0) as u64,
            gold_delta.max(0) as u64 + bonus_gold,
            crossed.len() as u32,
        )
    });
    let commit = AccountCommit {
        user: &user,
        entries: &entries,
        progress,
        session: match (&session, &receipt) {
            (Some(id), Some(receipt)) => Some((*id, receipt)),
            _ => None,
        },
    };

    let mut attempt = 0;
    loop {
        match store.commit_account(&commit) {
            Ok(()) => break,
            Err(EngineError::Conflict(detail)) if attempt < MAX_COMMIT_RETRIES => {
                attempt += 1;
                warn!(
                    "account commit conflict for user {} (attempt {}): {}",
                    user_id, attempt, detail
                );
            }
            Err(err) => return Err(err),
        }
    }

    debug!(
        "user {}: xp {} -> {}, gold -> {}, level {} ({} entries)",
        user_id,
        old_experience,
        user.experience,
        user.gold,
        user.level,
        entries.len()
    );

    Ok(AccountUpdate {
        levels_gained: crossed.len() as u32,
        bonus_gold,
        user,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemStore;
    use crate::types::User;

    fn store_with_user() -> (MemStore, u64) {
        let store = MemStore::new();
        let user = User::new(store.next_user_id().unwrap(), "tester");
        let grant =
            RewardLedgerEntry::new(user.id, RewardKind::Gold, user.gold as i64, "reg", None);
        store.create_user(&user, &grant).unwrap();
        (store, user.id)
    }

    #[test]
    fn single_grant_updates_balances_and_ledger() {
        let (store, id) = store_with_user();
        let update = apply_grants(
            &store,
            id,
            &[
                GrantRequest::new(RewardKind::Experience, 25, "study"),
                GrantRequest::new(RewardKind::Gold, 10, "study"),
            ],
            None,
            None,
        )
        .unwrap();
        assert_eq!(update.user.experience, 25);
        assert_eq!(update.user.gold, 110);
        assert_eq!(update.user.level, 1);
        assert_eq!(update.entries.len(), 2);
    }

    #[test]
    fn multi_level_jump_pays_bonus_per_boundary() {
        let (store, id) = store_with_user();
        // Set the stage at 90 XP.
        apply_grants(
            &store,
            id,
            &[GrantRequest::new(RewardKind::Experience, 90, "warmup")],
            None,
            None,
        )
        .unwrap();

        let update = apply_grants(
            &store,
            id,
            &[GrantRequest::new(RewardKind::Experience, 250, "boss quest")],
            None,
            None,
        )
        .unwrap();

        // 90 -> 340 XP crosses levels 2, 3, 4.
        assert_eq!(update.user.level, 4);
        assert_eq!(update.levels_gained, 3);
        assert_eq!(update.bonus_gold, 150);
        // One grant entry plus three bonus entries.
        assert_eq!(update.entries.len(), 4);
        let bonuses: Vec<_> = update
            .entries
            .iter()
            .filter(|e| e.reason.starts_with("Reached level"))
            .collect();
        assert_eq!(bonuses.len(), 3);
        assert!(bonuses.iter().all(|e| e.amount == 50));
    }

    #[test]
    fn zero_amount_grants_write_no_ledger_lines() {
        let (store, id) = store_with_user();
        let update = apply_grants(
            &store,
            id,
            &[
                GrantRequest::new(RewardKind::Experience, 1, "one minute"),
                GrantRequest::new(RewardKind::Gold, 0, "one minute"),
            ],
            None,
            None,
        )
        .unwrap();
        assert_eq!(update.entries.len(), 1);
        assert_eq!(update.entries[0].kind, RewardKind::Experience);
    }

    #[test]
    fn gold_underflow_is_rejected_before_commit() {
        let (store, id) = store_with_user();
        let err = apply_grants(
            &store,
            id,
            &[GrantRequest::new(RewardKind::Exchange, -150, "game time")],
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientBalance {
                required: 150,
                available: 100
            }
        ));
        // Nothing was written: balance untouched, only the registration entry.
        assert_eq!(store.get_user(id).unwrap().gold, 100);
        assert_eq!(store.ledger_for_user(id, 10).unwrap().len(), 1);
    }

    #[test]
    fn session_receipt_records_gains() {
        let (store, id) = store_with_user();
        let session = Uuid::new_v4();
        apply_grants(
            &store,
            id,
            &[GrantRequest::new(RewardKind::Experience, 110, "marathon")],
            None,
            Some(session),
        )
        .unwrap();
        let receipt = store.session_receipt(id, session).unwrap().unwrap();
        assert_eq!(receipt.experience_gained, 110);
        assert_eq!(receipt.levels_gained, 1);
        assert_eq!(receipt.gold_gained, 50);
    }
}
