//! Core record types shared by the engine and storage layers.
//!
//! Every persisted record carries a `schema_version` byte so stores can
//! detect stale on-disk data instead of silently misreading it. Records are
//! serialized with bincode inside the store and with serde_json in seed
//! files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version stamped on [`User`] records.
pub const USER_SCHEMA_VERSION: u8 = 1;
/// Schema version stamped on [`Quest`] records.
pub const QUEST_SCHEMA_VERSION: u8 = 1;
/// Schema version stamped on [`UserQuestProgress`] records.
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;
/// Schema version stamped on [`RewardLedgerEntry`] records.
pub const LEDGER_SCHEMA_VERSION: u8 = 1;
/// Schema version stamped on [`StudyRecord`] records.
pub const STUDY_SCHEMA_VERSION: u8 = 1;

/// Gold granted to every freshly registered account. The grant is written
/// to the ledger at registration so replaying a user's ledger from account
/// creation reproduces the live balance.
pub const STARTING_GOLD: u64 = 100;

/// A user account as seen by the progression engine.
///
/// `level` is derived from `experience` (see
/// [`crate::engine::progression::level_from_experience`]) and persisted for
/// cheap reads. It is only ever written inside the same commit that changes
/// `experience`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub experience: u64,
    pub level: u32,
    pub gold: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl User {
    /// Build a new account with the standard starting balances.
    pub fn new(id: u64, username: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: username.to_string(),
            experience: 0,
            level: 1,
            gold: STARTING_GOLD,
            is_active: true,
            created_at: now,
            updated_at: now,
            schema_version: USER_SCHEMA_VERSION,
        }
    }

    /// Refresh the modification timestamp before persisting.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Quest difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Quest cadence category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestType {
    Daily,
    Weekly,
    Boss,
    Special,
}

/// A learning task with fixed rewards. Quest content is managed outside
/// the engine; the engine only reads these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub subject: String,
    pub difficulty: Difficulty,
    pub experience_reward: u64,
    pub gold_reward: u64,
    pub quest_type: QuestType,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_quest_schema")]
    pub schema_version: u8,
}

fn default_true() -> bool {
    true
}

fn default_quest_schema() -> u8 {
    QUEST_SCHEMA_VERSION
}

/// Per-(user, quest) lifecycle state.
///
/// `completed` flips to true exactly once, the first time `progress`
/// reaches 100.0, and never flips back. Reward issuance happens at that
/// edge and nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuestProgress {
    pub user_id: u64,
    pub quest_id: u64,
    pub progress: f64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub score: Option<u32>,
    pub time_spent_secs: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserQuestProgress {
    /// Fresh record for a first quest start.
    pub fn start(user_id: u64, quest_id: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            quest_id,
            progress: 0.0,
            completed: false,
            completed_at: None,
            attempts: 1,
            score: None,
            time_spent_secs: 0,
            created_at: now,
            updated_at: now,
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    /// Refresh the modification timestamp before persisting.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What a ledger entry credits or debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Experience,
    Gold,
    Item,
    Exchange,
}

impl RewardKind {
    /// Stable name used in ledger keys and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Experience => "experience",
            RewardKind::Gold => "gold",
            RewardKind::Item => "item",
            RewardKind::Exchange => "exchange",
        }
    }
}

/// One immutable line of the reward ledger.
///
/// `amount` is signed: grants are positive, spends negative. Entries are
/// append-only; nothing in the engine updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardLedgerEntry {
    pub id: Uuid,
    pub user_id: u64,
    pub kind: RewardKind,
    pub amount: i64,
    pub reason: String,
    pub quest_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl RewardLedgerEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        user_id: u64,
        kind: RewardKind,
        amount: i64,
        reason: impl Into<String>,
        quest_id: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            reason: reason.into(),
            quest_id,
            created_at: Utc::now(),
            schema_version: LEDGER_SCHEMA_VERSION,
        }
    }
}

/// How a study duration was accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyType {
    Pomodoro,
    Quest,
}

/// Raw record of a completed study session, kept for statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: Uuid,
    pub user_id: u64,
    pub subject: String,
    pub duration_secs: u64,
    pub study_type: StudyType,
    pub quest_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl StudyRecord {
    pub fn new(user_id: u64, subject: &str, duration_secs: u64, study_type: StudyType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            subject: subject.to_string(),
            duration_secs,
            study_type,
            quest_id: None,
            created_at: Utc::now(),
            schema_version: STUDY_SCHEMA_VERSION,
        }
    }
}

/// Schema version stamped on [`SessionReceipt`] records.
pub const SESSION_SCHEMA_VERSION: u8 = 1;

/// Outcome of a credited study session, keyed by the caller-supplied
/// session id. A retried call with the same id gets this receipt back
/// instead of a second credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReceipt {
    pub experience_gained: u64,
    pub gold_gained: u64,
    pub levels_gained: u32,
    pub schema_version: u8,
}

impl SessionReceipt {
    pub fn new(experience_gained: u64, gold_gained: u64, levels_gained: u32) -> Self {
        Self {
            experience_gained,
            gold_gained,
            levels_gained,
            schema_version: SESSION_SCHEMA_VERSION,
        }
    }
}
