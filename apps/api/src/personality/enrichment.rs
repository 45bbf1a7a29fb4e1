//! Enrichment Client: one bounded call to the text generator per report,
//! followed by explicit validation of every field it returned.
//!
//! The model's output is untrusted. `validate_payload` is the only place that
//! reads it; everything downstream consumes `ValidatedEnrichment`, where each
//! field records whether it was supplied by the model or defaulted locally.
//! Failures never escape: they become `EnrichmentOutcome::Unavailable`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{parse_json_text, LlmError, TextGenerator};
use crate::personality::catalog::Catalog;
use crate::personality::composer::fallback_comment;
use crate::personality::demographics::Demographics;
use crate::personality::keywords::normalize_keywords;
use crate::personality::prompts::{build_enrichment_prompt, enrichment_system};
use crate::personality::traits::{round2, Trait, TraitVector, MAX_SCORE, MIN_SCORE};

/// Below this many characters of free text the call is skipped.
pub const MIN_OPEN_TEXT_CHARS: usize = 10;
pub const MIN_COMMENT_CHARS: usize = 20;
pub const MIN_ENRICHED_CAREERS: usize = 3;
pub const MIN_ENRICHED_COURSES: usize = 5;
/// Valid coalitions needed before the model's picks are used at all.
pub const MIN_ENRICHED_COALITIONS: usize = 2;

const REQUIRED_KEYS: [&str; 3] = ["updated_scores", "top_coalitions", "personality_comment"];

// ────────────────────────────────────────────────────────────────────────────
// Outcome types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentFailure {
    #[error("text generation request failed")]
    Transport,

    #[error("text generation timed out")]
    Timeout,

    #[error("text generation is not configured")]
    NotConfigured,

    #[error("not enough free text to analyse")]
    InsufficientContext,

    #[error("empty response")]
    EmptyResponse,

    #[error("response is not valid JSON")]
    MalformedJson,

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("response is missing required key '{0}'")]
    MissingKey(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Valid(ValidatedEnrichment),
    Unavailable(EnrichmentFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Supplied,
    Defaulted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    pub value: T,
    pub source: FieldSource,
}

impl<T> Field<T> {
    pub fn supplied(value: T) -> Self {
        Self {
            value,
            source: FieldSource::Supplied,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Self {
            value,
            source: FieldSource::Defaulted,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoalitionReason {
    /// Canonical catalog name.
    pub name: String,
    /// Empty when the model gave no reason.
    pub reason: String,
}

/// Model output after validation. Optional lists are `None` when they failed
/// their minimum-count check and the caller must derive them locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEnrichment {
    pub keywords: Vec<String>,
    pub scores: TraitVector,
    /// Traits whose model value was missing or invalid and kept the local score.
    pub defaulted_traits: Vec<Trait>,
    pub coalitions: Option<Vec<CoalitionReason>>,
    pub comment: Field<String>,
    pub careers: Option<Vec<String>>,
    pub courses: Option<Vec<String>>,
}

impl ValidatedEnrichment {
    pub fn scores_source(&self) -> FieldSource {
        if self.defaulted_traits.len() == Trait::ALL.len() {
            FieldSource::Defaulted
        } else {
            FieldSource::Supplied
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

pub struct EnrichmentClient {
    generator: Arc<dyn TextGenerator>,
    catalog: Arc<Catalog>,
    timeout: Duration,
}

impl EnrichmentClient {
    pub fn new(generator: Arc<dyn TextGenerator>, catalog: Arc<Catalog>, timeout: Duration) -> Self {
        Self {
            generator,
            catalog,
            timeout,
        }
    }

    /// Single attempt, no retry. A forced recomputation is the only retry path.
    pub async fn enrich(&self, local: &TraitVector, demographics: &Demographics) -> EnrichmentOutcome {
        if demographics.free_text_chars() < MIN_OPEN_TEXT_CHARS {
            info!("Skipping enrichment: free text too short");
            return EnrichmentOutcome::Unavailable(EnrichmentFailure::InsufficientContext);
        }

        let names: Vec<&str> = self.catalog.iter().map(|c| c.name.as_str()).collect();
        let scores: String = Trait::ALL
            .iter()
            .map(|&t| format!("- {t}: {}\n", local.get(t)))
            .collect();
        let prompt = build_enrichment_prompt(&names, scores.trim_end(), &demographics.open_text());
        let system = enrichment_system();

        let text = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt, &system)).await {
            Err(_) => {
                warn!("Enrichment timed out after {:?}", self.timeout);
                return EnrichmentOutcome::Unavailable(EnrichmentFailure::Timeout);
            }
            Ok(Err(LlmError::NotConfigured)) => {
                return EnrichmentOutcome::Unavailable(EnrichmentFailure::NotConfigured);
            }
            Ok(Err(LlmError::EmptyContent)) => {
                warn!("Enrichment returned no content");
                return EnrichmentOutcome::Unavailable(EnrichmentFailure::EmptyResponse);
            }
            Ok(Err(e)) => {
                warn!("Enrichment call failed: {e}");
                return EnrichmentOutcome::Unavailable(EnrichmentFailure::Transport);
            }
            Ok(Ok(text)) => text,
        };

        match validate_payload(&text, local, demographics.first_name(), &self.catalog) {
            Ok(validated) => {
                info!(
                    "Enrichment accepted: coalitions={}, defaulted_traits={}",
                    validated.coalitions.is_some(),
                    validated.defaulted_traits.len()
                );
                EnrichmentOutcome::Valid(validated)
            }
            Err(failure) => {
                warn!("Enrichment rejected: {failure}");
                EnrichmentOutcome::Unavailable(failure)
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Parses and validates raw model output. Pure; no I/O.
pub fn validate_payload(
    text: &str,
    local: &TraitVector,
    first_name: &str,
    catalog: &Catalog,
) -> Result<ValidatedEnrichment, EnrichmentFailure> {
    let value: Value = parse_json_text(text).map_err(|e| match e {
        LlmError::EmptyContent => EnrichmentFailure::EmptyResponse,
        _ => EnrichmentFailure::MalformedJson,
    })?;
    let obj = value.as_object().ok_or(EnrichmentFailure::NotAnObject)?;

    for key in REQUIRED_KEYS {
        if obj.get(key).map_or(true, Value::is_null) {
            return Err(EnrichmentFailure::MissingKey(key));
        }
    }

    let (scores, defaulted_traits) = validate_scores(obj.get("updated_scores"), local);

    let comment = match obj.get("personality_comment").and_then(Value::as_str).map(str::trim) {
        Some(c) if c.chars().count() >= MIN_COMMENT_CHARS => Field::supplied(c.to_string()),
        _ => Field::defaulted(fallback_comment(first_name, &scores)),
    };

    let keywords = obj
        .get("keywords")
        .or_else(|| obj.get("nlp_keywords"))
        .map(|v| normalize_keywords(string_items(v)))
        .unwrap_or_default();

    Ok(ValidatedEnrichment {
        keywords,
        scores,
        defaulted_traits,
        coalitions: validate_coalitions(obj, catalog),
        comment,
        careers: validate_titles(obj.get("career_recommendations"), MIN_ENRICHED_CAREERS),
        courses: validate_titles(obj.get("course_recommendations"), MIN_ENRICHED_COURSES),
    })
}

fn validate_scores(raw: Option<&Value>, local: &TraitVector) -> (TraitVector, Vec<Trait>) {
    let mut scores = *local;
    let mut supplied = HashSet::new();

    if let Some(map) = raw.and_then(Value::as_object) {
        for (key, value) in map {
            let Some(t) = Trait::from_name(key) else {
                continue;
            };
            match parse_score(value) {
                Some(score) => {
                    scores.set(t, round2(score));
                    supplied.insert(t);
                }
                None => warn!("Ignoring enriched {t} score {value}"),
            }
        }
    }

    let defaulted = Trait::ALL
        .into_iter()
        .filter(|t| !supplied.contains(t))
        .collect();
    (scores, defaulted)
}

/// Accepts JSON numbers and numeric strings inside [1, 5].
fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score)).then_some(score)
}

fn validate_coalitions(obj: &Map<String, Value>, catalog: &Catalog) -> Option<Vec<CoalitionReason>> {
    let mut seen = HashSet::new();
    let valid: Vec<CoalitionReason> = obj
        .get("top_coalitions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let coalition = catalog.find(name)?;
            seen.insert(coalition.name.clone()).then(|| CoalitionReason {
                name: coalition.name.clone(),
                reason: item
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(|r| r.trim().to_string())
                    .unwrap_or_default(),
            })
        })
        .collect();

    if valid.len() >= MIN_ENRICHED_COALITIONS {
        Some(valid)
    } else {
        warn!("Discarding enriched coalitions: only {} valid", valid.len());
        None
    }
}

/// Trimmed, case-insensitively de-duplicated titles, or `None` below `min`.
fn validate_titles(raw: Option<&Value>, min: usize) -> Option<Vec<String>> {
    let mut seen = HashSet::new();
    let titles: Vec<String> = raw
        .map(string_items)
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect();
    (titles.len() >= min).then_some(titles)
}

fn string_items(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
