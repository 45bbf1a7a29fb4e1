use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::chat::sentiment::spawn_sentiment_enrichment;
use crate::chat::store::{ChatMessage, ChatStore};
use crate::errors::AppError;
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Deserialize)]
pub struct PostMessageRequest {
    pub session_id: Uuid,
    pub content: String,
}

/// POST /api/v1/chat/messages
/// Stores the message and returns at once; sentiment is filled in later.
pub async fn handle_post_message(
    State(state): State<AppState>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("message content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message content must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let message = state.chat.insert_message(req.session_id, content).await?;
    spawn_sentiment_enrichment(
        state.sentiment.clone(),
        state.chat.clone(),
        message.id,
        message.content.clone(),
    );
    Ok((StatusCode::ACCEPTED, Json(message)))
}

/// GET /api/v1/chat/messages/:id
pub async fn handle_get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatMessage>, AppError> {
    let message = state
        .chat
        .get_message(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat message {id} not found")))?;
    Ok(Json(message))
}
