use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod models;
pub mod queries;

/// Webhook bursts and sweep ticks share this pool; acquisition is bounded
/// so a stuck connection surfaces as an error instead of a hung request.
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}
