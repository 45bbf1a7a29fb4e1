/// LLM Client — the single point of entry for all generative-text calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All LLM interactions MUST go through this module, usually via `TextGenerator`.
///
/// No retries here: callers get exactly one attempt per request and decide
/// how to degrade.
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for all LLM calls. Hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-1.5-pro-latest";
const MAX_OUTPUT_TOKENS: u32 = 4096;
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No API key configured for the text generation service")]
    NotConfigured,
}

/// Anything that turns a prompt into text. `LlmClient` is the production
/// implementation; tests substitute scripted doubles.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl LlmResponse {
    /// Extracts the text of the first candidate, joining its text parts.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// The LLM client shared by the report engine and chat sentiment enrichment.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
            api_key,
        })
    }

    /// Makes a single call to the Gemini API, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(format!("{GEMINI_API_BASE}/{MODEL}:generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage_metadata {
            debug!(
                "LLM call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(llm_response)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.call(prompt, system)
            .await?
            .text()
            .ok_or(LlmError::EmptyContent)
    }
}

/// Stand-in used when no API key is configured. Every call fails, so callers
/// take their deterministic fallback path.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

/// Parses model output as JSON, tolerating markdown code fences around it.
pub fn parse_json_text<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    serde_json::from_str(text).map_err(LlmError::Parse)
}

/// Strips a markdown code fence from LLM output. The language tag, if any,
/// may be `json` in any case.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(mut body) = text.strip_prefix("```") else {
        return text;
    };
    if body.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
        body = &body[4..];
    }
    let body = body.trim_start();
    body.strip_suffix("```").map(str::trim_end).unwrap_or(body)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        for tag in ["json", "JSON", "Json"] {
            let fenced = format!("```{tag}\n{{\"label\": \"calm\"}}\n```");
            assert_eq!(strip_json_fences(&fenced), r#"{"label": "calm"}"#, "tag {tag}");
        }
    }

    #[test]
    fn test_untagged_and_bare_replies_pass_through() {
        assert_eq!(strip_json_fences("  ```\n[1, 2]\n```  "), "[1, 2]");
        assert_eq!(strip_json_fences(" [1, 2] "), "[1, 2]");
        // unterminated fence keeps the body
        assert_eq!(strip_json_fences("```json\n{}"), "{}");
    }

    #[test]
    fn test_parse_json_text_accepts_uppercase_fence() {
        let value: serde_json::Value = parse_json_text("```JSON\n{\"score\": 0.5}\n```").unwrap();
        assert_eq!(value["score"], 0.5);
    }

    #[test]
    fn test_parse_json_text_rejects_fenced_empty_body() {
        let result: Result<serde_json::Value, _> = parse_json_text("```json\n```");
        assert!(matches!(result, Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_parse_json_text_rejects_prose() {
        let result: Result<serde_json::Value, _> = parse_json_text("Sure! Here is your analysis.");
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_response_text_joins_parts_of_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }"#;
        let response: LlmResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let response: LlmResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_generator_always_fails() {
        let result = UnconfiguredGenerator.generate("prompt", "system").await;
        assert!(matches!(result, Err(LlmError::NotConfigured)));
    }
}
