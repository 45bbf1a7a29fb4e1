pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::personality::handlers as personality;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Personality test
        .route(
            "/api/v1/personality/questions/:page",
            get(personality::handle_get_questions),
        )
        .route(
            "/api/v1/personality/results",
            post(personality::handle_submit_answers),
        )
        .route(
            "/api/v1/personality/results/:id/demographics",
            post(personality::handle_submit_demographics),
        )
        .route(
            "/api/v1/personality/results/:id/report",
            get(personality::handle_get_report),
        )
        // Chat
        .route("/api/v1/chat/messages", post(chat::handle_post_message))
        .route("/api/v1/chat/messages/:id", get(chat::handle_get_message))
        .with_state(state)
}
