use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Free-text context about the user. Only feeds enrichment, keyword
/// extraction and suggestion rules; never the trait scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Demographics {
    pub full_name: String,
    pub birth_year: Option<i32>,
    pub education: String,
    pub university_major: String,
    pub interests: String,
    pub goals: String,
    pub open_ended: String,
}

const MIN_AGE: i32 = 15;
const MAX_AGE: i32 = 100;

impl Demographics {
    /// Returns a caller-facing message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.validate_at(chrono::Utc::now().year())
    }

    fn validate_at(&self, current_year: i32) -> Result<(), String> {
        if let Some(year) = self.birth_year {
            let earliest = current_year - MAX_AGE;
            let latest = current_year - MIN_AGE;
            if !(earliest..=latest).contains(&year) {
                return Err(format!(
                    "birth_year must be between {earliest} and {latest}, got {year}"
                ));
            }
        }
        Ok(())
    }

    pub fn first_name(&self) -> &str {
        self.full_name.split_whitespace().next().unwrap_or("friend")
    }

    /// Characters the user actually wrote across the free-text fields.
    pub fn free_text_chars(&self) -> usize {
        [&self.interests, &self.goals, &self.open_ended]
            .iter()
            .map(|s| s.trim().chars().count())
            .sum()
    }

    /// Interests, goals and the open answer joined into one labelled block.
    pub fn open_text(&self) -> String {
        [
            ("Interests", &self.interests),
            ("Goals", &self.goals),
            ("About me", &self.open_ended),
        ]
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}: {}", value.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}
