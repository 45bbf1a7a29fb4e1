//! Tactical suggestions: three fixed openers followed by conditional rules,
//! evaluated in a fixed order so identical input gives identical output.

use crate::personality::demographics::Demographics;
use crate::personality::traits::TraitVector;

pub const MAX_SUGGESTIONS: usize = 5;

const LEADERSHIP_STEMS: &[&str] = &["leader", "manager", "entrepreneur", "presentation"];
const DEGREE_STEMS: &[&str] = &["bachelor", "university", "master"];
const CODING_STEMS: &[&str] = &["software", "coding", "programming"];

pub struct SuggestionInput<'a> {
    pub first_name: &'a str,
    pub scores: &'a TraitVector,
    pub keywords: &'a [String],
    pub coalitions: &'a [String; 2],
    pub demographics: &'a Demographics,
    pub first_course: Option<&'a str>,
}

type Rule = fn(&SuggestionInput) -> Option<String>;

const RULES: [Rule; 9] = [
    |input| {
        Some(format!(
            "{}, joining communities and events in your field can move your career goals forward.",
            input.first_name
        ))
    },
    |_| Some("Try drawing inspiration from fields outside your own to boost your creativity.".to_string()),
    |input| {
        input.first_course.map(|course| {
            format!("For your personal growth, consider the recommended {course} course.")
        })
    },
    |input| {
        let wants_to_lead = input
            .keywords
            .iter()
            .any(|k| LEADERSHIP_STEMS.iter().any(|s| k.contains(s)));
        (input.scores.extraversion < 3.0 && wants_to_lead).then(|| {
            "To balance leadership goals with a reserved nature, start by taking responsibility in small groups."
                .to_string()
        })
    },
    |input| {
        let creative = input.demographics.interests.to_lowercase().contains("creativ");
        (input.scores.openness > 4.0 && creative).then(|| {
            "With your high openness, creative projects that combine different disciplines could be very rewarding."
                .to_string()
        })
    },
    |input| {
        (input.scores.neuroticism > 3.5).then(|| {
            "Daily meditation and mindfulness exercises can strengthen your stress management.".to_string()
        })
    },
    |input| {
        let methodical = input.coalitions.iter().any(|c| c == "Methodical Expert");
        (methodical || input.scores.conscientiousness > 4.0).then(|| {
            "Your planning and organisation skills are strong; bring a systematic approach to your projects and career goals."
                .to_string()
        })
    },
    |input| {
        contains_any(&input.demographics.education, DEGREE_STEMS).then(|| {
            "Look for internships or volunteer work in sectors related to your studies to ease your career transition."
                .to_string()
        })
    },
    |input| {
        contains_any(&input.demographics.interests, CODING_STEMS).then(|| {
            "A portfolio or GitHub profile that shows your technical work will give you an edge when job hunting."
                .to_string()
        })
    },
];

fn contains_any(text: &str, stems: &[&str]) -> bool {
    let text = text.to_lowercase();
    stems.iter().any(|s| text.contains(s))
}

pub fn tactical_suggestions(input: &SuggestionInput) -> Vec<String> {
    RULES
        .iter()
        .filter_map(|rule| rule(input))
        .take(MAX_SUGGESTIONS)
        .collect()
}
