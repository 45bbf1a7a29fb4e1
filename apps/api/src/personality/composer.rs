//! Recommendation Composer: merges the matcher ranking with a validated
//! enrichment (when there is one) into the immutable `Report`.
//!
//! Every path through here satisfies the same structural guarantees: two
//! catalog coalitions, at least 3 careers and exactly 5 courses, at most 5
//! tactical suggestions.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::personality::catalog::Catalog;
use crate::personality::demographics::Demographics;
use crate::personality::enrichment::{EnrichmentOutcome, FieldSource, ValidatedEnrichment};
use crate::personality::keywords::{extract_keywords, tag_keywords, KeywordTag};
use crate::personality::matcher::{rank_coalitions, select_two, CoalitionMatch};
use crate::personality::suggestions::{tactical_suggestions, SuggestionInput};
use crate::personality::traits::{Trait, TraitVector};

pub const MIN_CAREERS: usize = 3;
pub const COURSE_COUNT: usize = 5;
pub const MAX_CAREERS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Report model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Enriched,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionPick {
    pub name: String,
    /// Enrichment reason when one was given, otherwise the catalog description.
    pub reason: String,
    pub score: f64,
    pub match_percent: u8,
}

/// Where each report section came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSources {
    pub trait_scores: FieldSource,
    pub top_coalitions: FieldSource,
    pub personality_comment: FieldSource,
    pub career_recommendations: FieldSource,
    pub course_recommendations: FieldSource,
    pub keywords: FieldSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub result_id: Uuid,
    pub provenance: Provenance,
    pub greeting: String,
    pub personality_type: String,
    pub trait_scores: TraitVector,
    pub top_coalitions: [CoalitionPick; 2],
    pub personality_comment: String,
    pub strengths: Vec<String>,
    pub areas_to_improve: Vec<String>,
    pub career_recommendations: Vec<String>,
    pub course_recommendations: Vec<String>,
    pub tactical_suggestions: Vec<String>,
    pub keywords: Vec<KeywordTag>,
    pub sources: FieldSources,
    pub generated_at: DateTime<Utc>,
}

/// Comment used when enrichment did not provide a usable one.
pub fn fallback_comment(first_name: &str, scores: &TraitVector) -> String {
    let ranked = scores.ranked();
    let (highest, lowest) = (ranked[0], ranked[ranked.len() - 1]);
    if highest.1 == lowest.1 {
        return format!(
            "Hi {first_name}, we analysed your answers and your personality traits are evenly balanced. \
            No single trait stands out, so your interests and goals weigh most in these recommendations."
        );
    }
    format!(
        "Hi {first_name}, we analysed your answers and identified your personality traits. \
        Your most prominent traits are {} and {}.",
        highest.0, ranked[1].0
    )
}

fn area_to_improve(lowest: Trait) -> &'static str {
    match lowest {
        Trait::Openness => "Try activities outside your comfort zone to become more open to new experiences and ideas.",
        Trait::Conscientiousness => "Make daily planning a habit and set small goals to build a more disciplined approach.",
        Trait::Extraversion => "Join group activities around topics you enjoy to become more active in social settings.",
        Trait::Agreeableness => "Practise active listening to better understand other people's points of view.",
        Trait::Neuroticism => "Stress management techniques and regular meditation can help balance emotional ups and downs.",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Composer
// ────────────────────────────────────────────────────────────────────────────

pub struct Composer {
    catalog: Arc<Catalog>,
}

impl Composer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn compose(
        &self,
        result_id: Uuid,
        local: &TraitVector,
        demographics: &Demographics,
        outcome: &EnrichmentOutcome,
    ) -> Report {
        let enriched: Option<&ValidatedEnrichment> = match outcome {
            EnrichmentOutcome::Valid(v) => Some(v),
            EnrichmentOutcome::Unavailable(_) => None,
        };
        let first_name = demographics.first_name();

        let (scores, scores_source) = match enriched {
            Some(v) => (v.scores, v.scores_source()),
            None => (*local, FieldSource::Defaulted),
        };

        let (keywords, keywords_source) = match enriched {
            Some(v) if !v.keywords.is_empty() => (v.keywords.clone(), FieldSource::Supplied),
            _ => (extract_keywords(&demographics.open_text()), FieldSource::Defaulted),
        };

        let ranking = rank_coalitions(&scores, &self.catalog, &keywords);
        let enriched_coalitions = enriched.and_then(|v| v.coalitions.as_ref());
        let provenance = if enriched_coalitions.is_some() {
            Provenance::Enriched
        } else {
            Provenance::Fallback
        };

        let candidates: Vec<&str> = match enriched_coalitions {
            Some(picks) => picks.iter().map(|c| c.name.as_str()).collect(),
            None => ranking.iter().map(|m| m.name.as_str()).collect(),
        };
        let names = select_two(&candidates, &scores, &self.catalog);
        let top_coalitions = names.clone().map(|name| {
            let reason = enriched_coalitions
                .and_then(|picks| picks.iter().find(|c| c.name == name))
                .map(|c| c.reason.clone())
                .filter(|r| !r.is_empty())
                .or_else(|| self.catalog.get(&name).map(|c| c.description.clone()))
                .unwrap_or_default();
            let matched = ranking.iter().find(|m| m.name == name);
            CoalitionPick {
                score: matched.map_or(0.0, |m| m.score),
                match_percent: matched.map_or(0, CoalitionMatch::match_percent),
                name,
                reason,
            }
        });

        let (personality_comment, comment_source) = match enriched {
            Some(v) => (v.comment.value.clone(), v.comment.source),
            None => (fallback_comment(first_name, &scores), FieldSource::Defaulted),
        };

        let (careers, careers_source) = match enriched.and_then(|v| v.careers.as_ref()) {
            Some(list) => (
                list.iter().take(MAX_CAREERS).cloned().collect(),
                FieldSource::Supplied,
            ),
            None => (
                self.catalog_careers(&names, &demographics.interests),
                FieldSource::Defaulted,
            ),
        };

        let (courses, courses_source) = match enriched.and_then(|v| v.courses.as_ref()) {
            Some(list) => (
                list.iter().take(COURSE_COUNT).cloned().collect(),
                FieldSource::Supplied,
            ),
            None => (self.catalog_courses(&names), FieldSource::Defaulted),
        };

        let suggestions = tactical_suggestions(&SuggestionInput {
            first_name,
            scores: &scores,
            keywords: &keywords,
            coalitions: &names,
            demographics,
            first_course: courses.first().map(String::as_str),
        });

        let mut strengths: Vec<String> = Vec::new();
        for pick in &top_coalitions {
            if !pick.reason.is_empty() && !strengths.contains(&pick.reason) {
                strengths.push(pick.reason.clone());
            }
        }

        Report {
            result_id,
            provenance,
            greeting: format!("Hi {first_name}, your personality report is ready!"),
            personality_type: names.join(" & "),
            trait_scores: scores,
            top_coalitions,
            personality_comment,
            strengths,
            areas_to_improve: vec![area_to_improve(scores.lowest()).to_string()],
            career_recommendations: careers,
            course_recommendations: courses,
            tactical_suggestions: suggestions,
            keywords: tag_keywords(&keywords),
            sources: FieldSources {
                trait_scores: scores_source,
                top_coalitions: if provenance == Provenance::Enriched {
                    FieldSource::Supplied
                } else {
                    FieldSource::Defaulted
                },
                personality_comment: comment_source,
                career_recommendations: careers_source,
                course_recommendations: courses_source,
                keywords: keywords_source,
            },
            generated_at: Utc::now(),
        }
    }

    /// Union of the two coalitions' careers; careers named in `interests` move
    /// to the front, then backfill from the rest of the catalog up to the minimum.
    fn catalog_careers(&self, names: &[String; 2], interests: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut careers: Vec<String> = names
            .iter()
            .filter_map(|n| self.catalog.get(n))
            .flat_map(|c| c.careers.iter())
            .filter(|career| seen.insert(career.to_lowercase()))
            .cloned()
            .collect();

        let interests = interests.to_lowercase();
        let (mut promoted, rest): (Vec<String>, Vec<String>) = careers
            .drain(..)
            .partition(|career| interests.contains(&career.to_lowercase()));
        promoted.extend(rest);
        careers = promoted;

        for coalition in self.catalog.iter().filter(|c| !names.contains(&c.name)) {
            for career in &coalition.careers {
                if careers.len() >= MIN_CAREERS {
                    break;
                }
                if seen.insert(career.to_lowercase()) {
                    careers.push(career.clone());
                }
            }
        }

        careers.truncate(MAX_CAREERS);
        careers
    }

    /// Union of the two coalitions' courses, backfilled in catalog order to exactly five.
    fn catalog_courses(&self, names: &[String; 2]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut courses: Vec<String> = names
            .iter()
            .filter_map(|n| self.catalog.get(n))
            .flat_map(|c| c.courses.iter())
            .filter(|course| seen.insert(course.to_lowercase()))
            .cloned()
            .collect();

        for coalition in self.catalog.iter().filter(|c| !names.contains(&c.name)) {
            for course in &coalition.courses {
                if courses.len() >= COURSE_COUNT {
                    break;
                }
                if seen.insert(course.to_lowercase()) {
                    courses.push(course.clone());
                }
            }
        }

        courses.truncate(COURSE_COUNT);
        courses
    }
}
