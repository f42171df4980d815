//! # Engine Module - Progression and Reward Engine
//!
//! The write-path heart of StudyQuest: converts study activity into
//! experience and gold, detects quest completion exactly once, derives
//! levels, and keeps the reward ledger consistent under concurrent
//! requests.
//!
//! ## Components
//!
//! - [`progression`] - pure reward/level formulas
//! - [`quest`] - quest lifecycle state machine
//! - [`ledger`] - reward ledger reasons, daily totals, replay audit
//! - [`exchange`] - gold-for-game-time conversion rules
//! - [`mutator`] - the atomic account write path
//! - [`stats`] - read-side projections (stats, leaderboard)
//!
//! ## Concurrency
//!
//! [`Engine`] serializes read-modify-write cycles per user behind a lazily
//! populated table of per-user async locks; operations on different users
//! run fully in parallel. Each commit is additionally atomic inside the
//! store, so a crash or failure can never leave a balance without its
//! ledger entries.
//!
//! Callers pass an already-authenticated user id; credential handling
//! lives outside this crate.

pub mod errors;
pub mod exchange;
pub mod ledger;
pub mod mutator;
pub mod progression;
pub mod quest;
pub mod stats;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use log::info;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::storage::{QuestFilter, SledStore, Store};
use crate::types::{
    Quest, RewardKind, RewardLedgerEntry, StudyRecord, StudyType, User, UserQuestProgress,
    STARTING_GOLD,
};

use errors::EngineError;
use exchange::ExchangeOutcome;
use mutator::GrantRequest;
use quest::{ProgressUpdate, QuestStartOutcome};
use stats::{LeaderboardRow, RewardStats};

/// Rewards issued by a quest completion, including level bookkeeping.
#[derive(Debug, Clone)]
pub struct QuestRewards {
    pub experience: u64,
    pub gold: u64,
    pub levels_gained: u32,
    pub bonus_gold: u64,
}

/// Result of a progress update.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub progress: f64,
    pub completed: bool,
    /// Present only on the update that triggered completion.
    pub rewards: Option<QuestRewards>,
}

/// Result of crediting a study session.
#[derive(Debug, Clone)]
pub struct StudyOutcome {
    pub experience_gained: u64,
    pub gold_gained: u64,
    pub levels_gained: u32,
    pub level: u32,
    pub experience: u64,
    pub gold: u64,
    /// True when the session id was already credited and this call was a
    /// no-op replay of the original receipt.
    pub duplicate_session: bool,
}

/// The progression engine's operations surface.
///
/// Owns the storage handle and the per-user lock table. Cheap to share:
/// wrap in an `Arc` and clone the handle per request.
pub struct Engine {
    store: Arc<dyn Store>,
    locks: StdMutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Engine over a sled store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Ok(Self::new(Arc::new(SledStore::open(path)?)))
    }

    /// Engine over the in-memory adapter with the sample quest catalog
    /// (dev mode and tests).
    pub fn in_memory() -> Result<Self, EngineError> {
        Ok(Self::new(Arc::new(
            crate::storage::memory::MemStore::with_sample_catalog()?,
        )))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Acquire this user's mutation lock. Held across every
    /// read-modify-write so two concurrent grants cannot both read the
    /// same pre-update balance.
    async fn lock_user(&self, user_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Create a user account with the standard starting balance. The
    /// 100-gold grant is ledgered so the account replays from creation.
    pub async fn register_user(&self, username: &str) -> Result<User, EngineError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(EngineError::InvalidInput("username is empty".into()));
        }
        let user = User::new(self.store.next_user_id()?, username);
        let grant = RewardLedgerEntry::new(
            user.id,
            RewardKind::Gold,
            STARTING_GOLD as i64,
            ledger::registration_reason(),
            None,
        );
        self.store.create_user(&user, &grant)?;
        info!("registered user '{}' (id {})", user.username, user.id);
        Ok(user)
    }

    /// Start (or re-enter) a quest. See [`quest::start_quest`].
    pub async fn start_quest(
        &self,
        user_id: u64,
        quest_id: u64,
    ) -> Result<QuestStartOutcome, EngineError> {
        let _guard = self.lock_user(user_id).await;
        quest::start_quest(self.store.as_ref(), user_id, quest_id)
    }

    /// Apply a partial progress update; on the completion edge, issue the
    /// quest's fixed rewards in the same commit that marks completion.
    pub async fn update_quest_progress(
        &self,
        user_id: u64,
        quest_id: u64,
        update: ProgressUpdate,
    ) -> Result<ProgressOutcome, EngineError> {
        quest::validate_update(&update)?;
        let _guard = self.lock_user(user_id).await;

        let mut record = self
            .store
            .get_progress(user_id, quest_id)?
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "quest {} was never started by user {}",
                    quest_id, user_id
                ))
            })?;

        let triggered = quest::apply_update(&mut record, &update);
        if !triggered {
            self.store.upsert_progress(&record)?;
            return Ok(ProgressOutcome {
                progress: record.progress,
                completed: record.completed,
                rewards: None,
            });
        }

        let quest = self.store.get_quest(quest_id)?;
        let reason = ledger::quest_reason(&quest.title);
        let grants = vec![
            GrantRequest::new(
                RewardKind::Experience,
                quest.experience_reward as i64,
                reason.clone(),
            )
            .for_quest(quest_id),
            GrantRequest::new(RewardKind::Gold, quest.gold_reward as i64, reason)
                .for_quest(quest_id),
        ];
        let update =
            mutator::apply_grants(self.store.as_ref(), user_id, &grants, Some(&record), None)?;
        info!(
            "user {} completed quest '{}': +{} xp, +{} gold, {} level(s)",
            user_id, quest.title, quest.experience_reward, quest.gold_reward, update.levels_gained
        );
        Ok(ProgressOutcome {
            progress: record.progress,
            completed: true,
            rewards: Some(QuestRewards {
                experience: quest.experience_reward,
                gold: quest.gold_reward,
                levels_gained: update.levels_gained,
                bonus_gold: update.bonus_gold,
            }),
        })
    }

    /// Credit a completed study session (pomodoro).
    ///
    /// Rejects zero durations. When `session` is supplied it acts as an
    /// idempotency key: a repeat of an already-credited id replays the
    /// original receipt instead of granting twice. Callers that pass
    /// `None` keep plain at-least-once semantics.
    pub async fn record_study_duration(
        &self,
        user_id: u64,
        subject: &str,
        duration_secs: u64,
        session: Option<Uuid>,
    ) -> Result<StudyOutcome, EngineError> {
        if duration_secs == 0 {
            return Err(EngineError::InvalidInput(
                "study duration must be positive".into(),
            ));
        }
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(EngineError::InvalidInput("subject is empty".into()));
        }

        let _guard = self.lock_user(user_id).await;

        if let Some(id) = session {
            if let Some(receipt) = self.store.session_receipt(user_id, id)? {
                let user = self.store.get_user(user_id)?;
                info!(
                    "user {}: study session {} already credited, replaying receipt",
                    user_id, id
                );
                return Ok(StudyOutcome {
                    experience_gained: receipt.experience_gained,
                    gold_gained: receipt.gold_gained,
                    levels_gained: receipt.levels_gained,
                    level: user.level,
                    experience: user.experience,
                    gold: user.gold,
                    duplicate_session: true,
                });
            }
        }

        let (xp, gold) = progression::reward_from_study_duration(duration_secs);
        let reason = ledger::study_reason(subject, duration_secs / 60);
        let grants = vec![
            GrantRequest::new(RewardKind::Experience, xp as i64, reason.clone()),
            GrantRequest::new(RewardKind::Gold, gold as i64, reason),
        ];
        let update =
            mutator::apply_grants(self.store.as_ref(), user_id, &grants, None, session)?;

        self.store.append_study_record(&StudyRecord::new(
            user_id,
            subject,
            duration_secs,
            StudyType::Pomodoro,
        ))?;

        info!(
            "user {} studied {} for {}s: +{} xp, +{} gold",
            user_id, subject, duration_secs, xp, gold
        );
        Ok(StudyOutcome {
            experience_gained: xp,
            gold_gained: gold + update.bonus_gold,
            levels_gained: update.levels_gained,
            level: update.user.level,
            experience: update.user.experience,
            gold: update.user.gold,
            duplicate_session: false,
        })
    }

    /// Spend gold on game time. See [`exchange`] for the cap and pricing.
    pub async fn exchange_currency(
        &self,
        user_id: u64,
        hours: u64,
    ) -> Result<ExchangeOutcome, EngineError> {
        let cost = exchange::validate_exchange(hours)?;
        let _guard = self.lock_user(user_id).await;

        let grants = vec![GrantRequest::new(
            RewardKind::Exchange,
            -(cost as i64),
            ledger::exchange_reason(hours),
        )];
        let update = mutator::apply_grants(self.store.as_ref(), user_id, &grants, None, None)?;
        info!(
            "user {} exchanged {} gold for {}h of game time ({} left)",
            user_id, cost, hours, update.user.gold
        );
        Ok(ExchangeOutcome {
            hours,
            gold_spent: cost,
            remaining_gold: update.user.gold,
        })
    }

    /// Most recent ledger entries for a user, newest first.
    pub async fn reward_history(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<RewardLedgerEntry>, EngineError> {
        self.store.get_user(user_id)?;
        self.store.ledger_for_user(user_id, limit)
    }

    /// Progression snapshot plus today's ledger totals.
    pub async fn reward_stats(&self, user_id: u64) -> Result<RewardStats, EngineError> {
        stats::reward_stats(self.store.as_ref(), user_id)
    }

    /// Active users ranked by experience. `subject` is accepted but not
    /// applied (no per-subject experience breakdown exists).
    pub async fn leaderboard(
        &self,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, EngineError> {
        stats::leaderboard(self.store.as_ref(), subject, limit)
    }

    /// Active quests, optionally filtered.
    pub async fn list_quests(&self, filter: &QuestFilter) -> Result<Vec<Quest>, EngineError> {
        self.store.list_quests(filter)
    }

    /// A user's quest progress joined with the quest definitions.
    pub async fn user_quests(
        &self,
        user_id: u64,
    ) -> Result<Vec<(UserQuestProgress, Quest)>, EngineError> {
        self.store.get_user(user_id)?;
        let mut out = Vec::new();
        for record in self.store.list_progress(user_id)? {
            let quest = self.store.get_quest(record.quest_id)?;
            out.push((record, quest));
        }
        Ok(out)
    }
}
