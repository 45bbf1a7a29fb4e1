// Prompt constants for report enrichment.
// Reuses the JSON-only rules from llm_client::prompts.

use crate::llm_client::prompts::json_system;

pub fn enrichment_system() -> String {
    json_system(
        "You are an expert in natural language processing and personality psychology \
        who helps young people find a career direction.",
    )
}

/// Enrichment prompt template. Replace `{coalition_names}`, `{scores}` and
/// `{open_text}` before sending.
pub const ENRICHMENT_PROMPT_TEMPLATE: &str = r#"A personality test has already computed Big Five scores (1-5) from multiple-choice answers.
You also receive the user's own words: interests, goals and an open-ended answer.

Analyse the text and return a JSON object with this EXACT schema:
{
  "keywords": ["creativity", "art", "leadership"],
  "updated_scores": {
    "Openness": 4.8,
    "Conscientiousness": 3.2,
    "Extraversion": 4.5,
    "Agreeableness": 4.0,
    "Neuroticism": 2.1
  },
  "top_coalitions": [
    {"name": "Innovative Explorer", "reason": "Drawn to new ideas and creative work."},
    {"name": "Social Leader", "reason": "Enjoys communicating with and leading people."}
  ],
  "personality_comment": "3-5 warm sentences that reference the user's own words.",
  "career_recommendations": ["Product Designer", "Advertising Creative", "Community Leader"],
  "course_recommendations": ["Creative Thinking Techniques", "Leadership and Effective Communication", "Entrepreneurship 101", "Mindfulness and Stress Management", "Data Analysis Fundamentals"]
}

Rules:
- keywords: important nouns and themes from the text, lowercase.
- updated_scores: adjust the initial scores only where the text gives evidence. Every value MUST be a number between 1 and 5.
- top_coalitions: EXACTLY 2 entries. Names MUST be copied verbatim from this list: {coalition_names}
- career_recommendations: 3 to 5 careers relevant to both the scores and the text.
- course_recommendations: at least 5 distinct courses across creative, technical, leadership and self-development domains.

Initial Big Five scores:
{scores}

User's own words:
{open_text}"#;

pub fn build_enrichment_prompt(coalition_names: &[&str], scores: &str, open_text: &str) -> String {
    ENRICHMENT_PROMPT_TEMPLATE
        .replace("{coalition_names}", &coalition_names.join(", "))
        .replace("{scores}", scores)
        .replace("{open_text}", open_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_fills_every_placeholder() {
        let prompt = build_enrichment_prompt(
            &["Innovative Explorer", "Team Player"],
            "- Openness: 4.2",
            "Interests: painting",
        );
        assert!(prompt.contains("this list: Innovative Explorer, Team Player"));
        assert!(prompt.contains("- Openness: 4.2"));
        assert!(prompt.ends_with("Interests: painting"));
        assert!(!prompt.contains("{open_text}"));
    }
}
