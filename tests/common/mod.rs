//! Shared test utilities

use std::sync::Arc;

use secrecy::SecretString;
use tabula_gateway::api::{ApiState, build_router};
use tabula_gateway::db::{self, ApiKeyRepo, DbPool, RecordRepo, SchemaRepo};
use tabula_gateway::idempotency::{IdempotencyConfig, MemoryStore, SharedStore};

/// Bootstrap key configured on the test state
pub const TEST_API_KEY: &str = "tbl_test_key";

/// Set up an in-memory test database with one tenant table
#[must_use]
pub fn setup_test_db() -> DbPool {
    let pool = db::init_memory().expect("failed to init test db");
    let conn = pool.get().expect("failed to get test connection");
    conn.execute_batch(
        r"
        CREATE TABLE notes (
            title TEXT NOT NULL,
            body TEXT,
            stars INTEGER NOT NULL DEFAULT 0
        );
        ",
    )
    .expect("failed to create test table");
    pool
}

/// A fully wired gateway router plus a handle to its idempotency store
pub struct TestApp {
    pub router: axum::Router,
    pub store: SharedStore,
}

/// Build a test gateway with the in-memory store and default configuration
#[must_use]
pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(MemoryStore::new()), IdempotencyConfig::default())
}

/// Build a test gateway around a specific store and idempotency configuration
#[must_use]
pub fn build_test_app_with(store: SharedStore, config: IdempotencyConfig) -> TestApp {
    let db = setup_test_db();
    let schema_repo = SchemaRepo::new(db.clone());
    let record_repo = RecordRepo::new(db.clone(), schema_repo.clone());
    let key_repo = ApiKeyRepo::new(db.clone());

    let state = Arc::new(ApiState {
        db,
        api_key: Some(SecretString::new(TEST_API_KEY.into())),
        schema_repo,
        record_repo,
        key_repo,
        idempotency_store: store.clone(),
        idempotency_config: config,
        rate_limiter: None,
    });

    TestApp {
        router: build_router(state),
        store,
    }
}
