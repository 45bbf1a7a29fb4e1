use std::time::Duration;

use anyhow::{bail, Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const REQUIRED_TABLES: [&str; 2] = ["personality_results", "chat_messages"];

/// Connects to PostgreSQL and checks that the service's tables exist.
/// Schema lives in `migrations/` and is applied outside the service.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL (max {max_connections} connections)...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let present: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = ANY($1)",
    )
    .bind(REQUIRED_TABLES.map(String::from).to_vec())
    .fetch_all(&pool)
    .await?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .into_iter()
        .filter(|t| !present.iter().any(|p| p == t))
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing tables {missing:?}; apply apps/api/migrations/001_personality.sql first"
        );
    }

    info!("PostgreSQL connection pool established");
    Ok(pool)
}
