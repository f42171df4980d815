//! Quest catalog seeding from JSON.
//!
//! Quest content is managed outside the engine; seeding gives fresh
//! deployments (and dev mode) something to work with. Operators can point
//! `seed` at their own JSON file instead of the bundled catalog.

use std::fs;
use std::path::Path;

use log::info;

use crate::engine::errors::EngineError;
use crate::storage::Store;
use crate::types::Quest;

/// Sample catalog bundled with the binary.
const BUNDLED_CATALOG: &str = include_str!("../../data/seeds/quests.json");

/// Parse a quest catalog from a JSON file on disk.
pub fn load_quests_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<Quest>, EngineError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_catalog(&contents).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to parse {}: {}", path.display(), e),
        ))
    })
}

/// The quest catalog compiled into the binary.
pub fn bundled_quests() -> Result<Vec<Quest>, EngineError> {
    parse_catalog(BUNDLED_CATALOG).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bundled quest catalog is invalid: {}", e),
        ))
    })
}

fn parse_catalog(contents: &str) -> Result<Vec<Quest>, serde_json::Error> {
    serde_json::from_str(contents)
}

/// Insert the bundled sample quests when the catalog holds none.
pub fn seed_catalog_if_empty<S: Store + ?Sized>(store: &S) -> Result<(), EngineError> {
    if store.quest_count()? > 0 {
        return Ok(());
    }
    let quests = bundled_quests()?;
    let count = quests.len();
    for quest in &quests {
        store.put_quest(quest)?;
    }
    info!("seeded quest catalog with {} sample quests", count);
    Ok(())
}

/// Insert or replace quests from an operator-supplied JSON file.
pub fn seed_catalog_from_file<S: Store + ?Sized, P: AsRef<Path>>(
    store: &S,
    path: P,
) -> Result<usize, EngineError> {
    let quests = load_quests_from_json(path)?;
    for quest in &quests {
        store.put_quest(quest)?;
    }
    Ok(quests.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemStore;
    use crate::storage::QuestFilter;

    #[test]
    fn bundled_catalog_parses() {
        let quests = bundled_quests().unwrap();
        assert!(!quests.is_empty());
        // Ids must be unique or later entries would shadow earlier ones.
        let mut ids: Vec<u64> = quests.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), quests.len());
    }

    #[test]
    fn seeding_is_idempotent() {
        let store = MemStore::new();
        seed_catalog_if_empty(&store).unwrap();
        let first = store.quest_count().unwrap();
        seed_catalog_if_empty(&store).unwrap();
        assert_eq!(store.quest_count().unwrap(), first);
        assert!(!store.list_quests(&QuestFilter::default()).unwrap().is_empty());
    }
}
