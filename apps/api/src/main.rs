mod chat;
mod config;
mod db;
mod errors;
mod llm_client;
mod personality;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::chat::sentiment::SentimentAnalyzer;
use crate::chat::store::PgChatStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::{LlmClient, TextGenerator, UnconfiguredGenerator};
use crate::personality::catalog::Catalog;
use crate::personality::engine::ReportEngine;
use crate::personality::enrichment::EnrichmentClient;
use crate::personality::questions::QuestionBank;
use crate::personality::repository::PgResultRepository;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathfinder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    // Initialize text generator (enrichment and chat sentiment share it)
    let generator: Arc<dyn TextGenerator> = match &config.gemini_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(llm)
        }
        None => {
            warn!("GEMINI_API_KEY not set; reports use local fallback, chat sentiment stays neutral");
            Arc::new(UnconfiguredGenerator)
        }
    };

    // Read-only domain data
    let catalog = Arc::new(match &config.catalog_path {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::builtin(),
    });
    let questions = Arc::new(QuestionBank::builtin());
    info!(
        "Loaded {} coalitions and {} questions ({} scored)",
        catalog.len(),
        questions.len(),
        questions.personality().count()
    );

    let enrichment = EnrichmentClient::new(
        Arc::clone(&generator),
        Arc::clone(&catalog),
        config.enrichment_timeout,
    );
    let engine = ReportEngine::new(
        questions,
        catalog,
        Arc::new(PgResultRepository::new(db.clone())),
        enrichment,
    )
    .with_cache_capacity(config.report_cache_capacity);

    // Build app state
    let state = AppState {
        enrichment_enabled: config.gemini_api_key.is_some(),
        engine: Arc::new(engine),
        chat: Arc::new(PgChatStore::new(db)),
        sentiment: Arc::new(SentimentAnalyzer::new(generator, config.enrichment_timeout)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
