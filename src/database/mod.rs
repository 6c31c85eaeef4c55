//! # Database Operations
//!
//! Connection pooling, schema migrations and the explicit transaction scopes
//! every order, reservation and admission operation runs inside.
//!
//! ## Key Components
//!
//! - [`transaction`] - `TransactionScope`, conflict retry and deadline helpers
//! - [`error_codes`] - SQLSTATE classification for retry and timeout decisions

pub mod error_codes;
pub mod transaction;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

pub use error_codes::PgErrorCode;
pub use transaction::{
    retry_on_conflict, with_deadline, DeadlineExceeded, RetryableError, TransactionPolicy,
    TransactionScope,
};

/// Build the shared connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool established"
    );

    Ok(pool)
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
