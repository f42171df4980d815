//! Concurrency integration: per-user serialization must rule out lost
//! updates while different users proceed in parallel.

mod common;

use studyquest::types::RewardKind;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_study_calls_both_credit() {
    let env = common::sled_engine();
    let user = common::register(&env, "alice").await;

    // Two 60-second sessions at once: 1 XP each, no gold (0.4 truncates).
    let a = {
        let engine = env.engine.clone();
        tokio::spawn(async move { engine.record_study_duration(user.id, "math", 60, None).await })
    };
    let b = {
        let engine = env.engine.clone();
        tokio::spawn(async move { engine.record_study_duration(user.id, "math", 60, None).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let after = env.engine.store().get_user(user.id).unwrap();
    assert_eq!(after.experience, 2, "a grant was lost");

    let study_entries = env
        .engine
        .reward_history(user.id, 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == RewardKind::Experience)
        .count();
    assert_eq!(study_entries, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn many_writers_one_user_still_sums_exactly() {
    let env = common::sled_engine();
    let user = common::register(&env, "bob").await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = env.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.record_study_duration(user.id, "math", 300, None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 20 x 5 minutes = 100 XP exactly, which also crosses one level.
    let after = env.engine.store().get_user(user.id).unwrap();
    assert_eq!(after.experience, 100);
    assert_eq!(after.level, 2);
    // Starting 100 + 20 x 2 gold + one 50-gold level bonus.
    assert_eq!(after.gold, 100 + 40 + 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_users_make_independent_progress() {
    let env = common::sled_engine();
    let alice = common::register(&env, "alice").await;
    let bob = common::register(&env, "bob").await;

    let mut handles = Vec::new();
    for id in [alice.id, bob.id] {
        for _ in 0..5 {
            let engine = env.engine.clone();
            handles.push(tokio::spawn(async move {
                engine.record_study_duration(id, "physics", 600, None).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(env.engine.store().get_user(alice.id).unwrap().experience, 50);
    assert_eq!(env.engine.store().get_user(bob.id).unwrap().experience, 50);
}
