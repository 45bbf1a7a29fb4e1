use std::sync::Arc;

use crate::chat::sentiment::SentimentAnalyzer;
use crate::chat::store::ChatStore;
use crate::personality::engine::ReportEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReportEngine>,
    pub chat: Arc<dyn ChatStore>,
    pub sentiment: Arc<SentimentAnalyzer>,
    /// False when no generator key is configured; reports then always use the local fallback.
    pub enrichment_enabled: bool,
}
