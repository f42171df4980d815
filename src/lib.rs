//! # StudyQuest - Gamified Study Tracking Backend
//!
//! StudyQuest turns study time into game progression: users earn
//! experience and gold by finishing timed study sessions and quests,
//! level up in fixed 100-XP bands, and spend gold on game time. This
//! crate is the progression and reward engine plus its persistence;
//! authentication and transport live outside it.
//!
//! ## Features
//!
//! - **Progression Rules**: 1 XP and 0.4 gold per study minute, fixed
//!   quest rewards, a 50-gold bonus for every level boundary crossed.
//! - **One-Shot Quest Completion**: edge-triggered reward issuance the
//!   first time progress reaches 100%, never again.
//! - **Reward Ledger**: append-only history of every grant and spend;
//!   live balances are a replayable projection of it.
//! - **Atomic Commits**: balance, derived level, and ledger entries land
//!   in one storage transaction, with per-user serialization against
//!   lost updates.
//! - **Pluggable Storage**: sled-backed store for deployments, an
//!   in-memory adapter for dev mode and tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use studyquest::engine::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::open("./data")?;
//!
//!     let user = engine.register_user("alice").await?;
//!     let outcome = engine
//!         .record_study_duration(user.id, "math", 1500, None)
//!         .await?;
//!     println!("earned {} xp", outcome.experience_gained);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - the progression/reward engine and its operations surface
//! - [`storage`] - the [`storage::Store`] trait, sled and in-memory stores
//! - [`types`] - persisted record types shared across layers
//! - [`config`] - TOML configuration management

pub mod config;
pub mod engine;
pub mod storage;
pub mod types;
