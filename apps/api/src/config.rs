use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::personality::cache::DEFAULT_REPORT_CACHE_CAPACITY;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Absent key disables enrichment; every report is then composed locally.
    pub gemini_api_key: Option<String>,
    pub enrichment_timeout: Duration,
    /// Finished reports kept in memory; evicted ones reload from the database.
    pub report_cache_capacity: usize,
    /// Optional JSON file replacing the built-in coalition catalog.
    pub catalog_path: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

const DEFAULT_ENRICHMENT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: optional_env("DB_MAX_CONNECTIONS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("DB_MAX_CONNECTIONS must be a positive whole number")?
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            enrichment_timeout: Duration::from_secs(
                optional_env("ENRICHMENT_TIMEOUT_SECS")
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("ENRICHMENT_TIMEOUT_SECS must be a whole number of seconds")?
                    .unwrap_or(DEFAULT_ENRICHMENT_TIMEOUT_SECS),
            ),
            report_cache_capacity: optional_env("REPORT_CACHE_CAPACITY")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("REPORT_CACHE_CAPACITY must be a whole number")?
                .unwrap_or(DEFAULT_REPORT_CACHE_CAPACITY),
            catalog_path: optional_env("COALITION_CATALOG_PATH").map(PathBuf::from),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
