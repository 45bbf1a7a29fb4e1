use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::chat::sentiment::{Sentiment, SentimentSink};
use crate::personality::repository::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    /// Filled in later by the sentiment task.
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatStore: SentimentSink {
    async fn insert_message(&self, session_id: Uuid, content: &str) -> Result<ChatMessage, StoreError>;
    async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError>;
}

pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn insert_message(&self, session_id: Uuid, content: &str) -> Result<ChatMessage, StoreError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (session_id, content)
            VALUES ($1, $2)
            RETURNING id, session_id, content, sentiment_label, sentiment_score, created_at
            "#,
        )
        .bind(session_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, content, sentiment_label, sentiment_score, created_at
            FROM chat_messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }
}

#[async_trait]
impl SentimentSink for PgChatStore {
    async fn record_sentiment(&self, message_id: Uuid, sentiment: &Sentiment) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET sentiment_label = $2, sentiment_score = $3, sentiment_analyzed = TRUE
            WHERE id = $1
            "#,
        )
        .bind(message_id)
        .bind(sentiment.label.as_str())
        .bind(sentiment.score)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(message_id));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryChatStore {
        messages: Mutex<HashMap<Uuid, ChatMessage>>,
    }

    impl MemoryChatStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ChatStore for MemoryChatStore {
        async fn insert_message(&self, session_id: Uuid, content: &str) -> Result<ChatMessage, StoreError> {
            let message = ChatMessage {
                id: Uuid::new_v4(),
                session_id,
                content: content.to_string(),
                sentiment_label: None,
                sentiment_score: None,
                created_at: Utc::now(),
            };
            self.messages.lock().unwrap().insert(message.id, message.clone());
            Ok(message)
        }

        async fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
            Ok(self.messages.lock().unwrap().get(&id).cloned())
        }
    }

    #[async_trait]
    impl SentimentSink for MemoryChatStore {
        async fn record_sentiment(&self, message_id: Uuid, sentiment: &Sentiment) -> Result<(), StoreError> {
            let mut messages = self.messages.lock().unwrap();
            let message = messages
                .get_mut(&message_id)
                .ok_or(StoreError::Missing(message_id))?;
            message.sentiment_label = Some(sentiment.label.as_str().to_string());
            message.sentiment_score = Some(sentiment.score);
            Ok(())
        }
    }
}
