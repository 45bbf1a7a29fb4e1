//! Sentiment tagging for user chat messages.
//!
//! Runs off the request path: the message is stored first, then a detached
//! task asks the text generator for a `{label, score}` verdict and writes it
//! back. Any failure degrades to `neutral / 0.0`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chat::prompts::{build_sentiment_prompt, sentiment_system};
use crate::llm_client::{parse_json_text, LlmError, TextGenerator};
use crate::personality::repository::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Anxious,
    Excited,
    Undecided,
    Unmotivated,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 7] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Anxious,
        SentimentLabel::Excited,
        SentimentLabel::Undecided,
        SentimentLabel::Unmotivated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Anxious => "anxious",
            SentimentLabel::Excited => "excited",
            SentimentLabel::Undecided => "undecided",
            SentimentLabel::Unmotivated => "unmotivated",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// -1.0 (very negative) to 1.0 (very positive).
    pub score: f64,
}

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment {
        label: SentimentLabel::Neutral,
        score: 0.0,
    };
}

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed sentiment payload: {0}")]
    Malformed(String),
}

pub struct SentimentAnalyzer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl SentimentAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Never fails; falls back to `Sentiment::NEUTRAL`.
    pub async fn analyze(&self, message: &str) -> Sentiment {
        match self.try_analyze(message).await {
            Ok(sentiment) => sentiment,
            Err(e) => {
                warn!("Sentiment analysis failed, using neutral: {e}");
                Sentiment::NEUTRAL
            }
        }
    }

    async fn try_analyze(&self, message: &str) -> Result<Sentiment, SentimentError> {
        let prompt = build_sentiment_prompt(message);
        let system = sentiment_system();
        let text = tokio::time::timeout(self.timeout, self.generator.generate(&prompt, &system))
            .await
            .map_err(|_| SentimentError::Timeout(self.timeout))??;
        parse_sentiment(&text)
    }
}

/// Validates a raw `{label, score}` reply. Out-of-range scores are clamped.
pub fn parse_sentiment(text: &str) -> Result<Sentiment, SentimentError> {
    let value: Value = parse_json_text(text)?;

    let raw_label = value
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| SentimentError::Malformed("missing label".to_string()))?;
    let label = SentimentLabel::from_name(raw_label)
        .ok_or_else(|| SentimentError::Malformed(format!("unknown label '{raw_label}'")))?;

    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| SentimentError::Malformed("missing or non-numeric score".to_string()))?;

    if !(-1.0..=1.0).contains(&score) {
        warn!("Sentiment score {score} out of range, clamping to [-1, 1]");
    }
    Ok(Sentiment {
        label,
        score: score.clamp(-1.0, 1.0),
    })
}

/// Where finished sentiment verdicts are written.
#[async_trait]
pub trait SentimentSink: Send + Sync {
    async fn record_sentiment(&self, message_id: Uuid, sentiment: &Sentiment) -> Result<(), StoreError>;
}

/// Analyzes `content` on a detached task and records the verdict for
/// `message_id`. The caller does not wait for it.
pub fn spawn_sentiment_enrichment<S>(
    analyzer: Arc<SentimentAnalyzer>,
    sink: Arc<S>,
    message_id: Uuid,
    content: String,
) -> JoinHandle<()>
where
    S: SentimentSink + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!("Starting sentiment analysis for message {message_id}");
        let sentiment = analyzer.analyze(&content).await;
        match sink.record_sentiment(message_id, &sentiment).await {
            Ok(()) => info!(
                "Sentiment for message {message_id}: {} ({})",
                sentiment.label.as_str(),
                sentiment.score
            ),
            Err(e) => error!("Failed to record sentiment for message {message_id}: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::store::memory::MemoryChatStore;
    use crate::chat::store::ChatStore;
    use crate::llm_client::testing::{Script, ScriptedGenerator};

    fn analyzer(script: Script) -> (SentimentAnalyzer, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator::new(script));
        (
            SentimentAnalyzer::new(generator.clone(), Duration::from_secs(10)),
            generator,
        )
    }

    #[test]
    fn test_parse_accepts_known_label_case_insensitively() {
        let sentiment = parse_sentiment(r#"{"label": "Anxious", "score": -0.6}"#).unwrap();
        assert_eq!(sentiment.label, SentimentLabel::Anxious);
        assert_eq!(sentiment.score, -0.6);
    }

    #[test]
    fn test_parse_clamps_score_and_accepts_numeric_strings() {
        let high = parse_sentiment(r#"{"label": "excited", "score": 3}"#).unwrap();
        assert_eq!(high.score, 1.0);

        let text = parse_sentiment("```json\n{\"label\": \"negative\", \"score\": \"-0.4\"}\n```").unwrap();
        assert_eq!(text.label, SentimentLabel::Negative);
        assert_eq!(text.score, -0.4);
    }

    #[test]
    fn test_parse_rejects_unknown_label_and_missing_score() {
        assert!(matches!(
            parse_sentiment(r#"{"label": "ecstatic", "score": 0.9}"#),
            Err(SentimentError::Malformed(_))
        ));
        assert!(matches!(
            parse_sentiment(r#"{"label": "positive"}"#),
            Err(SentimentError::Malformed(_))
        ));
        assert!(matches!(
            parse_sentiment("not json"),
            Err(SentimentError::Generation(LlmError::Parse(_)))
        ));
    }

    #[tokio::test]
    async fn test_analyze_falls_back_to_neutral_on_failure() {
        let (analyzer, generator) = analyzer(Script::Fail);
        assert_eq!(analyzer.analyze("I have no idea what to study").await, Sentiment::NEUTRAL);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_falls_back_to_neutral_on_timeout() {
        let (analyzer, _) = analyzer(Script::Hang);
        assert_eq!(analyzer.analyze("hello").await, Sentiment::NEUTRAL);
    }

    #[tokio::test]
    async fn test_spawned_enrichment_records_verdict() {
        let (analyzer, generator) = analyzer(Script::Reply(
            r#"{"label": "excited", "score": 0.8}"#.to_string(),
        ));
        let store = Arc::new(MemoryChatStore::new());
        let session = Uuid::new_v4();
        let message = store.insert_message(session, "I got into the design course!").await.unwrap();

        spawn_sentiment_enrichment(Arc::new(analyzer), store.clone(), message.id, message.content)
            .await
            .unwrap();

        let stored = store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.sentiment_label.as_deref(), Some("excited"));
        assert_eq!(stored.sentiment_score, Some(0.8));
        assert!(generator.last_prompt().unwrap().contains("I got into the design course!"));
    }
}
