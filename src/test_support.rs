//! Shared helpers for DB-backed tests.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::{AppConfig, JwtConfig};
use crate::state::{AppState, MIGRATOR};

/// Fresh migrated in-memory database. Each test gets its own store; the
/// single connection keeps the in-memory database alive for the pool's
/// lifetime.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    MIGRATOR.run(&pool).await.expect("run migrations");
    pool
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt: JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_expires_in: "15m".into(),
            refresh_expires_in: "7d".into(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(604_800),
        },
    }
}

/// App state over a fresh migrated in-memory database.
pub async fn test_state() -> AppState {
    AppState::from_parts(test_pool().await, Arc::new(test_config()))
}
