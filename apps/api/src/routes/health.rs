use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness plus whether reports can be enriched.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let enrichment = if state.enrichment_enabled { "configured" } else { "disabled" };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pathfinder-api",
        "enrichment": enrichment,
    }))
}
