//! Local keyword extraction and tagging for the report's keyword section.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Keywords shown in a report.
pub const MAX_REPORT_KEYWORDS: usize = 15;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "who", "did",
    "get", "got", "let", "she", "too", "use", "with", "that", "this", "from", "they", "them",
    "then", "than", "there", "their", "what", "when", "where", "which", "while", "will", "would",
    "about", "into", "like", "just", "also", "some", "such", "very", "more", "most", "much",
    "want", "been", "being", "were", "does", "doing", "myself", "because", "could", "should",
    "really", "things", "thing", "over", "only", "other", "these", "those", "each", "both",
    "interests", "goals",
];

const SKILL_STEMS: &[&str] = &[
    "design", "coding", "analysis", "management", "communication", "software", "project",
    "planning", "research",
];
const INTEREST_STEMS: &[&str] = &[
    "art", "science", "music", "sport", "travel", "book", "technology", "nature", "photo", "cook",
];
const PERSONALITY_STEMS: &[&str] = &[
    "leader", "creativ", "analytic", "detail", "social", "team", "success", "motivat", "disciplin",
    "patien",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordKind {
    Skill,
    Interest,
    Personality,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTag {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: KeywordKind,
}

/// Lowercase word tokens longer than two characters, minus stopwords,
/// de-duplicated in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !stopwords.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Lowercases, trims and de-duplicates keywords from an untrusted list.
pub fn normalize_keywords<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Substring match against fixed stems; skill wins over interest over personality.
pub fn classify(keyword: &str) -> KeywordKind {
    let keyword = keyword.to_lowercase();
    let hit = |stems: &[&str]| stems.iter().any(|s| keyword.contains(s));
    if hit(SKILL_STEMS) {
        KeywordKind::Skill
    } else if hit(INTEREST_STEMS) {
        KeywordKind::Interest
    } else if hit(PERSONALITY_STEMS) {
        KeywordKind::Personality
    } else {
        KeywordKind::Other
    }
}

pub fn tag_keywords(keywords: &[String]) -> Vec<KeywordTag> {
    keywords
        .iter()
        .take(MAX_REPORT_KEYWORDS)
        .map(|k| KeywordTag {
            text: k.clone(),
            kind: classify(k),
        })
        .collect()
}
