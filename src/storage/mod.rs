//! # Storage Module - Engine Persistence Layer
//!
//! Persistence behind the progression engine: user accounts, the quest
//! catalog, per-user quest progress, the append-only reward ledger, study
//! records, and study-session idempotency receipts.
//!
//! ## Architecture
//!
//! The [`Store`] trait is the boundary the engine programs against. Two
//! implementations ship:
//!
//! - [`SledStore`] - sled-backed, bincode-serialized records in named
//!   trees. The multi-step account commit runs as one sled multi-tree
//!   transaction, so a balance update can never land without its ledger
//!   entries (or the other way around).
//! - [`memory::MemStore`] - a `Mutex`-guarded in-memory adapter with the
//!   same semantics, used by dev mode and tests.
//!
//! ## Key layout (sled)
//!
//! ```text
//! accounts tree:  users:{id}              → User
//!                 usernames:{lowercase}   → id (8-byte BE)
//!                 progress:{user}:{quest} → UserQuestProgress
//!                 sessions:{user}:{uuid}  → SessionReceipt
//! ledger tree:    ledger:{user}:{nanos}:{seq} → RewardLedgerEntry
//! catalog tree:   quests:{id}             → Quest
//! study tree:     study:{user}:{nanos}    → StudyRecord
//! ```
//!
//! Numeric key segments are zero-padded so lexicographic order matches
//! numeric order; per-user ledger keys therefore sort in commit order.

pub mod memory;
pub mod seed;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use sled::transaction::ConflictableTransactionError;
use sled::{IVec, Transactional};
use uuid::Uuid;

use crate::engine::errors::EngineError;
use crate::types::{
    Difficulty, Quest, QuestType, RewardKind, RewardLedgerEntry, SessionReceipt, StudyRecord,
    User, UserQuestProgress, LEDGER_SCHEMA_VERSION, PROGRESS_SCHEMA_VERSION,
    QUEST_SCHEMA_VERSION, USER_SCHEMA_VERSION,
};

const TREE_ACCOUNTS: &str = "studyquest_accounts";
const TREE_LEDGER: &str = "studyquest_ledger";
const TREE_CATALOG: &str = "studyquest_catalog";
const TREE_STUDY: &str = "studyquest_study";

fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Filters accepted by [`Store::list_quests`]. Only active quests match.
#[derive(Debug, Clone, Default)]
pub struct QuestFilter {
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub quest_type: Option<QuestType>,
}

impl QuestFilter {
    fn matches(&self, quest: &Quest) -> bool {
        if !quest.is_active {
            return false;
        }
        if let Some(subject) = &self.subject {
            if !quest.subject.eq_ignore_ascii_case(subject) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if quest.difficulty != difficulty {
                return false;
            }
        }
        if let Some(quest_type) = self.quest_type {
            if quest.quest_type != quest_type {
                return false;
            }
        }
        true
    }
}

/// One atomic write batch against a single user's account.
///
/// Everything in here commits together or not at all: the updated user
/// record, the ledger entries explaining the change, an optional quest
/// progress upsert (so completion state and its reward cannot diverge),
/// and an optional study-session receipt for idempotent retries.
pub struct AccountCommit<'a> {
    pub user: &'a User,
    pub entries: &'a [RewardLedgerEntry],
    pub progress: Option<&'a UserQuestProgress>,
    pub session: Option<(Uuid, &'a SessionReceipt)>,
}

/// Storage boundary consumed by the engine.
///
/// All methods are short, bounded operations. Per-user serialization of
/// read-modify-write cycles is the engine's job; atomicity of each commit
/// is the store's.
pub trait Store: Send + Sync {
    /// Create a user account together with its registration ledger grant,
    /// so the starting balance is replayable from the ledger. Fails with
    /// `InvalidInput` if the username is taken.
    fn create_user(&self, user: &User, grant: &RewardLedgerEntry) -> Result<(), EngineError>;
    /// Allocate a fresh user id.
    fn next_user_id(&self) -> Result<u64, EngineError>;
    fn get_user(&self, id: u64) -> Result<User, EngineError>;
    fn get_user_by_name(&self, username: &str) -> Result<User, EngineError>;
    fn list_users(&self) -> Result<Vec<User>, EngineError>;

    /// Insert or replace a quest definition (seeding / content management).
    fn put_quest(&self, quest: &Quest) -> Result<(), EngineError>;
    fn get_quest(&self, id: u64) -> Result<Quest, EngineError>;
    fn list_quests(&self, filter: &QuestFilter) -> Result<Vec<Quest>, EngineError>;
    fn quest_count(&self) -> Result<usize, EngineError>;

    fn get_progress(
        &self,
        user_id: u64,
        quest_id: u64,
    ) -> Result<Option<UserQuestProgress>, EngineError>;
    /// Insert or replace a progress record outside of a reward commit
    /// (quest starts and non-completing updates).
    fn upsert_progress(&self, progress: &UserQuestProgress) -> Result<(), EngineError>;
    fn list_progress(&self, user_id: u64) -> Result<Vec<UserQuestProgress>, EngineError>;

    /// Apply one [`AccountCommit`] atomically.
    fn commit_account(&self, commit: &AccountCommit<'_>) -> Result<(), EngineError>;

    /// Ledger entries for a user, newest first, capped at `limit`.
    fn ledger_for_user(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<RewardLedgerEntry>, EngineError>;
    /// Sum of a user's entries of `kind` dated on the given UTC calendar day.
    fn sum_ledger_by_kind_and_date(
        &self,
        user_id: u64,
        kind: RewardKind,
        date: NaiveDate,
    ) -> Result<i64, EngineError>;

    fn append_study_record(&self, record: &StudyRecord) -> Result<(), EngineError>;
    /// Receipt from a previously credited study session, if any.
    fn session_receipt(
        &self,
        user_id: u64,
        session: Uuid,
    ) -> Result<Option<SessionReceipt>, EngineError>;
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct StoreBuilder {
    path: PathBuf,
    seed_catalog: bool,
}

impl StoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_catalog: true,
        }
    }

    /// Opt out of seeding the sample quest catalog during initialization
    /// (useful for targeted tests).
    pub fn without_catalog_seed(mut self) -> Self {
        self.seed_catalog = false;
        self
    }

    pub fn open(self) -> Result<SledStore, EngineError> {
        SledStore::open_with_options(self.path, self.seed_catalog)
    }
}

/// Sled-backed persistence for engine state.
pub struct SledStore {
    db: sled::Db,
    accounts: sled::Tree,
    ledger: sled::Tree,
    catalog: sled::Tree,
    study: sled::Tree,
}

impl SledStore {
    /// Open (or create) the store rooted at `path`. When `seed_catalog` is
    /// true the bundled sample quests are inserted if the catalog is empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed_catalog: bool) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let accounts = db.open_tree(TREE_ACCOUNTS)?;
        let ledger = db.open_tree(TREE_LEDGER)?;
        let catalog = db.open_tree(TREE_CATALOG)?;
        let study = db.open_tree(TREE_STUDY)?;
        let store = Self {
            db,
            accounts,
            ledger,
            catalog,
            study,
        };

        if seed_catalog {
            seed::seed_catalog_if_empty(&store)?;
        }

        Ok(store)
    }

    fn user_key(id: u64) -> Vec<u8> {
        format!("users:{:020}", id).into_bytes()
    }

    fn username_key(username: &str) -> Vec<u8> {
        format!("usernames:{}", username.to_ascii_lowercase()).into_bytes()
    }

    fn quest_key(id: u64) -> Vec<u8> {
        format!("quests:{:020}", id).into_bytes()
    }

    fn progress_key(user_id: u64, quest_id: u64) -> Vec<u8> {
        format!("progress:{:020}:{:020}", user_id, quest_id).into_bytes()
    }

    fn progress_prefix(user_id: u64) -> Vec<u8> {
        format!("progress:{:020}:", user_id).into_bytes()
    }

    fn session_key(user_id: u64, session: Uuid) -> Vec<u8> {
        format!("sessions:{:020}:{}", user_id, session.simple()).into_bytes()
    }

    fn ledger_key(user_id: u64, nanos: i64, seq: usize) -> Vec<u8> {
        format!("ledger:{:020}:{:020}:{:03}", user_id, nanos, seq).into_bytes()
    }

    fn ledger_prefix(user_id: u64) -> Vec<u8> {
        format!("ledger:{:020}:", user_id).into_bytes()
    }

    fn study_key(user_id: u64, nanos: i64) -> Vec<u8> {
        format!("study:{:020}:{:020}", user_id, nanos).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, EngineError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), EngineError> {
        if expected != found {
            return Err(EngineError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn decode_user(bytes: IVec) -> Result<User, EngineError> {
        let user: User = Self::deserialize(bytes)?;
        Self::check_schema("user", USER_SCHEMA_VERSION, user.schema_version)?;
        Ok(user)
    }

    fn decode_ledger_entry(bytes: IVec) -> Result<RewardLedgerEntry, EngineError> {
        let entry: RewardLedgerEntry = Self::deserialize(bytes)?;
        Self::check_schema("ledger entry", LEDGER_SCHEMA_VERSION, entry.schema_version)?;
        Ok(entry)
    }

    fn decode_progress(bytes: IVec) -> Result<UserQuestProgress, EngineError> {
        let progress: UserQuestProgress = Self::deserialize(bytes)?;
        Self::check_schema(
            "quest progress",
            PROGRESS_SCHEMA_VERSION,
            progress.schema_version,
        )?;
        Ok(progress)
    }
}

impl Store for SledStore {
    fn create_user(&self, user: &User, grant: &RewardLedgerEntry) -> Result<(), EngineError> {
        let name_key = Self::username_key(&user.username);
        if self.accounts.contains_key(&name_key)? {
            return Err(EngineError::InvalidInput(format!(
                "username already taken: {}",
                user.username
            )));
        }
        let user_key = Self::user_key(user.id);
        let user_bytes = Self::serialize(user)?;
        let id_bytes = user.id.to_be_bytes().to_vec();
        let entry_key = Self::ledger_key(user.id, next_timestamp_nanos(), 0);
        let entry_bytes = Self::serialize(grant)?;

        (&self.accounts, &self.ledger)
            .transaction(|(accounts, ledger)| {
                accounts.insert(user_key.as_slice(), user_bytes.as_slice())?;
                accounts.insert(name_key.as_slice(), id_bytes.as_slice())?;
                ledger.insert(entry_key.as_slice(), entry_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<EngineError>>(())
            })
            .map_err(map_transaction_error)?;
        Ok(())
    }

    fn next_user_id(&self) -> Result<u64, EngineError> {
        // sled ids are monotonic per database; offset so ids start at 1.
        Ok(self.db.generate_id()? + 1)
    }

    fn get_user(&self, id: u64) -> Result<User, EngineError> {
        match self.accounts.get(Self::user_key(id))? {
            Some(bytes) => Self::decode_user(bytes),
            None => Err(EngineError::NotFound(format!("user {}", id))),
        }
    }

    fn get_user_by_name(&self, username: &str) -> Result<User, EngineError> {
        match self.accounts.get(Self::username_key(username))? {
            Some(bytes) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes);
                self.get_user(u64::from_be_bytes(raw))
            }
            None => Err(EngineError::NotFound(format!("user {}", username))),
        }
    }

    fn list_users(&self) -> Result<Vec<User>, EngineError> {
        let mut users = Vec::new();
        for item in self.accounts.scan_prefix(b"users:") {
            let (_, bytes) = item?;
            users.push(Self::decode_user(bytes)?);
        }
        Ok(users)
    }

    fn put_quest(&self, quest: &Quest) -> Result<(), EngineError> {
        let mut quest = quest.clone();
        quest.schema_version = QUEST_SCHEMA_VERSION;
        self.catalog
            .insert(Self::quest_key(quest.id), Self::serialize(&quest)?)?;
        Ok(())
    }

    fn get_quest(&self, id: u64) -> Result<Quest, EngineError> {
        match self.catalog.get(Self::quest_key(id))? {
            Some(bytes) => {
                let quest: Quest = Self::deserialize(bytes)?;
                Self::check_schema("quest", QUEST_SCHEMA_VERSION, quest.schema_version)?;
                Ok(quest)
            }
            None => Err(EngineError::NotFound(format!("quest {}", id))),
        }
    }

    fn list_quests(&self, filter: &QuestFilter) -> Result<Vec<Quest>, EngineError> {
        let mut quests = Vec::new();
        for item in self.catalog.scan_prefix(b"quests:") {
            let (_, bytes) = item?;
            let quest: Quest = Self::deserialize(bytes)?;
            Self::check_schema("quest", QUEST_SCHEMA_VERSION, quest.schema_version)?;
            if filter.matches(&quest) {
                quests.push(quest);
            }
        }
        Ok(quests)
    }

    fn quest_count(&self) -> Result<usize, EngineError> {
        Ok(self.catalog.scan_prefix(b"quests:").count())
    }

    fn get_progress(
        &self,
        user_id: u64,
        quest_id: u64,
    ) -> Result<Option<UserQuestProgress>, EngineError> {
        match self.accounts.get(Self::progress_key(user_id, quest_id))? {
            Some(bytes) => Ok(Some(Self::decode_progress(bytes)?)),
            None => Ok(None),
        }
    }

    fn upsert_progress(&self, progress: &UserQuestProgress) -> Result<(), EngineError> {
        self.accounts.insert(
            Self::progress_key(progress.user_id, progress.quest_id),
            Self::serialize(progress)?,
        )?;
        Ok(())
    }

    fn list_progress(&self, user_id: u64) -> Result<Vec<UserQuestProgress>, EngineError> {
        let mut records = Vec::new();
        for item in self.accounts.scan_prefix(Self::progress_prefix(user_id)) {
            let (_, bytes) = item?;
            records.push(Self::decode_progress(bytes)?);
        }
        Ok(records)
    }

    fn commit_account(&self, commit: &AccountCommit<'_>) -> Result<(), EngineError> {
        let user_key = Self::user_key(commit.user.id);
        let user_bytes = Self::serialize(commit.user)?;

        let nanos = next_timestamp_nanos();
        let mut entry_kvs = Vec::with_capacity(commit.entries.len());
        for (seq, entry) in commit.entries.iter().enumerate() {
            entry_kvs.push((
                Self::ledger_key(commit.user.id, nanos, seq),
                Self::serialize(entry)?,
            ));
        }

        let progress_kv = match commit.progress {
            Some(progress) => Some((
                Self::progress_key(progress.user_id, progress.quest_id),
                Self::serialize(progress)?,
            )),
            None => None,
        };

        let session_kv = match commit.session {
            Some((session, receipt)) => Some((
                Self::session_key(commit.user.id, session),
                Self::serialize(receipt)?,
            )),
            None => None,
        };

        (&self.accounts, &self.ledger)
            .transaction(|(accounts, ledger)| {
                accounts.insert(user_key.as_slice(), user_bytes.as_slice())?;
                if let Some((key, bytes)) = &progress_kv {
                    accounts.insert(key.as_slice(), bytes.as_slice())?;
                }
                if let Some((key, bytes)) = &session_kv {
                    accounts.insert(key.as_slice(), bytes.as_slice())?;
                }
                for (key, bytes) in &entry_kvs {
                    ledger.insert(key.as_slice(), bytes.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<EngineError>>(())
            })
            .map_err(map_transaction_error)?;
        Ok(())
    }

    fn ledger_for_user(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<RewardLedgerEntry>, EngineError> {
        // Keys sort in commit order, so a reverse prefix scan yields
        // newest-first without touching the whole history.
        let mut entries = Vec::new();
        for item in self
            .ledger
            .scan_prefix(Self::ledger_prefix(user_id))
            .rev()
            .take(limit)
        {
            let (_, bytes) = item?;
            entries.push(Self::decode_ledger_entry(bytes)?);
        }
        Ok(entries)
    }

    fn sum_ledger_by_kind_and_date(
        &self,
        user_id: u64,
        kind: RewardKind,
        date: NaiveDate,
    ) -> Result<i64, EngineError> {
        let mut total = 0i64;
        for item in self.ledger.scan_prefix(Self::ledger_prefix(user_id)) {
            let (_, bytes) = item?;
            let entry = Self::decode_ledger_entry(bytes)?;
            if entry.kind == kind && entry.created_at.date_naive() == date {
                total += entry.amount;
            }
        }
        Ok(total)
    }

    fn append_study_record(&self, record: &StudyRecord) -> Result<(), EngineError> {
        self.study.insert(
            Self::study_key(record.user_id, next_timestamp_nanos()),
            Self::serialize(record)?,
        )?;
        Ok(())
    }

    fn session_receipt(
        &self,
        user_id: u64,
        session: Uuid,
    ) -> Result<Option<SessionReceipt>, EngineError> {
        match self.accounts.get(Self::session_key(user_id, session))? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }
}

fn map_transaction_error(err: sled::transaction::TransactionError<EngineError>) -> EngineError {
    match err {
        sled::transaction::TransactionError::Abort(inner) => inner,
        sled::transaction::TransactionError::Storage(inner) => EngineError::Sled(inner),
    }
}
