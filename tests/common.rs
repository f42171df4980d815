//! Test utilities & fixtures.
//! Builds throwaway sled-backed engines in temp directories, pre-seeded
//! with the bundled sample quest catalog.

use std::sync::Arc;

use studyquest::engine::Engine;
use studyquest::storage::StoreBuilder;
use studyquest::types::User;

/// A sled-backed engine living in a temp directory. The directory is
/// removed when this is dropped.
pub struct TestEnv {
    pub engine: Arc<Engine>,
    _dir: tempfile::TempDir,
}

pub fn sled_engine() -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StoreBuilder::new(dir.path()).open().expect("open store");
    TestEnv {
        engine: Arc::new(Engine::new(Arc::new(store))),
        _dir: dir,
    }
}

pub async fn register(env: &TestEnv, name: &str) -> User {
    env.engine.register_user(name).await.expect("register user")
}
