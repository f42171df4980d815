//! In-memory [`Store`] adapter.
//!
//! Backs dev mode and tests with the same semantics as the sled store but
//! no disk. One mutex guards all state, which trivially gives each
//! [`AccountCommit`] its all-or-nothing property.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::engine::errors::EngineError;
use crate::storage::{AccountCommit, QuestFilter, Store};
use crate::types::{
    Quest, RewardKind, RewardLedgerEntry, SessionReceipt, StudyRecord, User, UserQuestProgress,
};

#[derive(Default)]
struct Inner {
    next_id: u64,
    users: HashMap<u64, User>,
    usernames: HashMap<String, u64>,
    quests: BTreeMap<u64, Quest>,
    progress: HashMap<(u64, u64), UserQuestProgress>,
    ledger: HashMap<u64, Vec<RewardLedgerEntry>>,
    study: Vec<StudyRecord>,
    sessions: HashMap<(u64, Uuid), SessionReceipt>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New store pre-populated with the bundled sample quest catalog.
    pub fn with_sample_catalog() -> Result<Self, EngineError> {
        let store = Self::new();
        super::seed::seed_catalog_if_empty(&store)?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned mutex only means another test thread panicked while
        // holding it; the data itself is still coherent key-value state.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Store for MemStore {
    fn create_user(&self, user: &User, grant: &RewardLedgerEntry) -> Result<(), EngineError> {
        let mut inner = self.lock();
        let name = user.username.to_ascii_lowercase();
        if inner.usernames.contains_key(&name) {
            return Err(EngineError::InvalidInput(format!(
                "username already taken: {}",
                user.username
            )));
        }
        inner.usernames.insert(name, user.id);
        inner.users.insert(user.id, user.clone());
        inner.ledger.entry(user.id).or_default().push(grant.clone());
        Ok(())
    }

    fn next_user_id(&self) -> Result<u64, EngineError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        Ok(inner.next_id)
    }

    fn get_user(&self, id: u64) -> Result<User, EngineError> {
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("user {}", id)))
    }

    fn get_user_by_name(&self, username: &str) -> Result<User, EngineError> {
        let inner = self.lock();
        inner
            .usernames
            .get(&username.to_ascii_lowercase())
            .and_then(|id| inner.users.get(id))
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("user {}", username)))
    }

    fn list_users(&self) -> Result<Vec<User>, EngineError> {
        Ok(self.lock().users.values().cloned().collect())
    }

    fn put_quest(&self, quest: &Quest) -> Result<(), EngineError> {
        self.lock().quests.insert(quest.id, quest.clone());
        Ok(())
    }

    fn get_quest(&self, id: u64) -> Result<Quest, EngineError> {
        self.lock()
            .quests
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("quest {}", id)))
    }

    fn list_quests(&self, filter: &QuestFilter) -> Result<Vec<Quest>, EngineError> {
        Ok(self
            .lock()
            .quests
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }

    fn quest_count(&self) -> Result<usize, EngineError> {
        Ok(self.lock().quests.len())
    }

    fn get_progress(
        &self,
        user_id: u64,
        quest_id: u64,
    ) -> Result<Option<UserQuestProgress>, EngineError> {
        Ok(self.lock().progress.get(&(user_id, quest_id)).cloned())
    }

    fn upsert_progress(&self, progress: &UserQuestProgress) -> Result<(), EngineError> {
        self.lock()
            .progress
            .insert((progress.user_id, progress.quest_id), progress.clone());
        Ok(())
    }

    fn list_progress(&self, user_id: u64) -> Result<Vec<UserQuestProgress>, EngineError> {
        let mut records: Vec<UserQuestProgress> = self
            .lock()
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|p| p.quest_id);
        Ok(records)
    }

    fn commit_account(&self, commit: &AccountCommit<'_>) -> Result<(), EngineError> {
        let mut inner = self.lock();
        inner.users.insert(commit.user.id, commit.user.clone());
        if let Some(progress) = commit.progress {
            inner
                .progress
                .insert((progress.user_id, progress.quest_id), progress.clone());
        }
        if let Some((session, receipt)) = commit.session {
            inner
                .sessions
                .insert((commit.user.id, session), receipt.clone());
        }
        inner
            .ledger
            .entry(commit.user.id)
            .or_default()
            .extend_from_slice(commit.entries);
        Ok(())
    }

    fn ledger_for_user(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<RewardLedgerEntry>, EngineError> {
        let inner = self.lock();
        let entries = inner.ledger.get(&user_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    fn sum_ledger_by_kind_and_date(
        &self,
        user_id: u64,
        kind: RewardKind,
        date: NaiveDate,
    ) -> Result<i64, EngineError> {
        let inner = self.lock();
        Ok(inner
            .ledger
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|e| e.kind == kind && e.created_at.date_naive() == date)
            .map(|e| e.amount)
            .sum())
    }

    fn append_study_record(&self, record: &StudyRecord) -> Result<(), EngineError> {
        self.lock().study.push(record.clone());
        Ok(())
    }

    fn session_receipt(
        &self,
        user_id: u64,
        session: Uuid,
    ) -> Result<Option<SessionReceipt>, EngineError> {
        Ok(self.lock().sessions.get(&(user_id, session)).cloned())
    }
}
