//! Quest lifecycle integration: start, partial updates, and one-shot
//! completion rewards against the sled store.

mod common;

use studyquest::engine::errors::EngineError;
use studyquest::engine::quest::ProgressUpdate;
use studyquest::types::RewardKind;

// Seeded quest 1: "Function basics", 50 xp / 10 gold.
const QUEST: u64 = 1;

#[tokio::test]
async fn full_lifecycle_awards_fixed_rewards_once() {
    let env = common::sled_engine();
    let user = common::register(&env, "alice").await;

    let start = env.engine.start_quest(user.id, QUEST).await.unwrap();
    assert!(start.newly_started);
    assert_eq!(start.attempts, 1);

    let halfway = env
        .engine
        .update_quest_progress(
            user.id,
            QUEST,
            ProgressUpdate {
                progress: Some(50.0),
                score: Some(80),
                time_spent_secs: Some(300),
            },
        )
        .await
        .unwrap();
    assert!(!halfway.completed);
    assert!(halfway.rewards.is_none());

    let done = env
        .engine
        .update_quest_progress(
            user.id,
            QUEST,
            ProgressUpdate {
                progress: Some(100.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(done.completed);
    let rewards = done.rewards.expect("completion rewards");
    assert_eq!(rewards.experience, 50);
    assert_eq!(rewards.gold, 10);

    let after = env.engine.store().get_user(user.id).unwrap();
    assert_eq!(after.experience, 50);
    assert_eq!(after.gold, 110);
    assert_eq!(after.level, 1);
}

#[tokio::test]
async fn resubmitting_completion_never_rewards_again() {
    let env = common::sled_engine();
    let user = common::register(&env, "bob").await;
    env.engine.start_quest(user.id, QUEST).await.unwrap();

    let complete = ProgressUpdate {
        progress: Some(100.0),
        ..Default::default()
    };
    env.engine
        .update_quest_progress(user.id, QUEST, complete.clone())
        .await
        .unwrap();
    // Re-submit completion several times; none may issue rewards.
    for _ in 0..3 {
        let outcome = env
            .engine
            .update_quest_progress(user.id, QUEST, complete.clone())
            .await
            .unwrap();
        assert!(outcome.completed);
        assert!(outcome.rewards.is_none());
    }

    // Ledger entries tied to this quest total exactly the fixed reward.
    let entries = env.engine.reward_history(user.id, 100).await.unwrap();
    let quest_xp: i64 = entries
        .iter()
        .filter(|e| e.quest_id == Some(QUEST) && e.kind == RewardKind::Experience)
        .map(|e| e.amount)
        .sum();
    let quest_gold: i64 = entries
        .iter()
        .filter(|e| e.quest_id == Some(QUEST) && e.kind == RewardKind::Gold)
        .map(|e| e.amount)
        .sum();
    assert_eq!(quest_xp, 50);
    assert_eq!(quest_gold, 10);
    assert_eq!(env.engine.store().get_user(user.id).unwrap().experience, 50);
}

#[tokio::test]
async fn restarting_a_completed_quest_counts_attempts_only() {
    let env = common::sled_engine();
    let user = common::register(&env, "carol").await;
    env.engine.start_quest(user.id, QUEST).await.unwrap();
    env.engine
        .update_quest_progress(
            user.id,
            QUEST,
            ProgressUpdate {
                progress: Some(100.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let restart = env.engine.start_quest(user.id, QUEST).await.unwrap();
    assert!(restart.already_completed);
    assert_eq!(restart.attempts, 2);
    assert_eq!(env.engine.store().get_user(user.id).unwrap().experience, 50);
}

#[tokio::test]
async fn updating_an_unstarted_quest_is_not_found() {
    let env = common::sled_engine();
    let user = common::register(&env, "dave").await;
    let err = env
        .engine
        .update_quest_progress(
            user.id,
            QUEST,
            ProgressUpdate {
                progress: Some(10.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn boss_quest_completion_crosses_multiple_levels() {
    let env = common::sled_engine();
    let user = common::register(&env, "erin").await;

    // 90 XP of study first (1.5 hours).
    env.engine
        .record_study_duration(user.id, "math", 90 * 60, None)
        .await
        .unwrap();

    // Seeded quest 4 is the 250-XP boss: 90 -> 340 crosses levels 2, 3, 4.
    env.engine.start_quest(user.id, 4).await.unwrap();
    let outcome = env
        .engine
        .update_quest_progress(
            user.id,
            4,
            ProgressUpdate {
                progress: Some(100.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let rewards = outcome.rewards.expect("boss rewards");
    assert_eq!(rewards.levels_gained, 3);
    assert_eq!(rewards.bonus_gold, 150);

    let after = env.engine.store().get_user(user.id).unwrap();
    assert_eq!(after.experience, 340);
    assert_eq!(after.level, 4);

    let bonus_entries: Vec<_> = env
        .engine
        .reward_history(user.id, 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.reason.starts_with("Reached level"))
        .collect();
    assert_eq!(bonus_entries.len(), 3);
}

#[tokio::test]
async fn user_quests_joins_progress_with_definitions() {
    let env = common::sled_engine();
    let user = common::register(&env, "fred").await;
    env.engine.start_quest(user.id, 1).await.unwrap();
    env.engine.start_quest(user.id, 3).await.unwrap();

    let quests = env.engine.user_quests(user.id).await.unwrap();
    assert_eq!(quests.len(), 2);
    let ids: Vec<u64> = quests.iter().map(|(_, q)| q.id).collect();
    assert_eq!(ids, vec![1, 3]);
}
