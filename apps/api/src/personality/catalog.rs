//! Coalition Catalog: named archetypes with an ideal trait vector, keywords,
//! careers and courses. Read-only after construction; shared as `Arc<Catalog>`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::personality::composer::{COURSE_COUNT, MIN_CAREERS};
use crate::personality::traits::{Trait, TraitVector, MAX_SCORE, MIN_SCORE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Partial ideals are allowed; unspecified dimensions are 3.0.
    pub ideal: TraitVector,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub careers: Vec<String>,
    #[serde(default)]
    pub courses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    coalitions: Vec<CoalitionProfile>,
}

/// Coalition used to pad a degenerate ranking, keyed by the user's highest trait.
pub fn default_coalition_for(t: Trait) -> &'static str {
    match t {
        Trait::Openness => "Innovative Explorer",
        Trait::Conscientiousness => "Methodical Expert",
        Trait::Extraversion => "Social Leader",
        Trait::Agreeableness => "Team Player",
        Trait::Neuroticism => "Cool-headed Strategist",
    }
}

impl Catalog {
    /// Validates and wraps a list of coalitions. Order is significant: it breaks
    /// ranking ties and drives career/course backfill.
    pub fn new(coalitions: Vec<CoalitionProfile>) -> Result<Self> {
        if coalitions.len() < 2 {
            bail!("coalition catalog needs at least 2 entries, got {}", coalitions.len());
        }
        let mut seen = HashSet::new();
        for c in &coalitions {
            let name = c.name.trim();
            if name.is_empty() {
                bail!("coalition catalog contains an entry without a name");
            }
            if !seen.insert(name.to_lowercase()) {
                bail!("duplicate coalition name '{name}'");
            }
            for t in Trait::ALL {
                let v = c.ideal.get(t);
                if !(MIN_SCORE..=MAX_SCORE).contains(&v) {
                    bail!("coalition '{name}' has {t} ideal {v} outside [1, 5]");
                }
            }
        }

        // backfill must always be able to reach the report minimums
        if distinct(coalitions.iter().flat_map(|c| &c.careers)) < MIN_CAREERS {
            bail!("coalition catalog needs at least {MIN_CAREERS} distinct careers");
        }
        if distinct(coalitions.iter().flat_map(|c| &c.courses)) < COURSE_COUNT {
            bail!("coalition catalog needs at least {COURSE_COUNT} distinct courses");
        }
        Ok(Self { coalitions })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading coalition catalog {}", path.display()))?;
        let coalitions: Vec<CoalitionProfile> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing coalition catalog {}", path.display()))?;
        Self::new(coalitions)
    }

    pub fn builtin() -> Self {
        Self {
            coalitions: builtin_coalitions(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CoalitionProfile> {
        self.coalitions.iter().find(|c| c.name == name)
    }

    /// Case-insensitive lookup returning the canonical entry.
    pub fn find(&self, name: &str) -> Option<&CoalitionProfile> {
        let name = name.trim();
        self.coalitions
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoalitionProfile> {
        self.coalitions.iter()
    }

    pub fn len(&self) -> usize {
        self.coalitions.len()
    }
}

fn distinct<'a>(titles: impl Iterator<Item = &'a String>) -> usize {
    titles.map(|t| t.to_lowercase()).collect::<HashSet<_>>().len()
}

fn profile(
    name: &str,
    description: &str,
    ideal: &[(Trait, f64)],
    keywords: &[&str],
    careers: &[&str],
    courses: &[&str],
) -> CoalitionProfile {
    let mut vector = TraitVector::NEUTRAL;
    for &(t, v) in ideal {
        vector.set(t, v);
    }
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    CoalitionProfile {
        name: name.to_string(),
        description: description.to_string(),
        ideal: vector,
        keywords: owned(keywords),
        careers: owned(careers),
        courses: owned(courses),
    }
}

fn builtin_coalitions() -> Vec<CoalitionProfile> {
    use Trait::*;
    vec![
        profile(
            "Innovative Explorer",
            "Curious and inventive; drawn to new ideas and to turning them into products.",
            &[(Openness, 5.0), (Conscientiousness, 3.0), (Extraversion, 4.0)],
            &["creativity", "design", "entrepreneurship", "innovation", "idea", "discovery"],
            &["Product Designer", "Entrepreneur", "Advertising Creative", "UX/UI Designer"],
            &["Creative Thinking Techniques", "Entrepreneurship 101", "UX/UI Fundamentals"],
        ),
        profile(
            "Methodical Expert",
            "Disciplined and detail-oriented; builds reliable systems through careful planning.",
            &[(Conscientiousness, 5.0), (Openness, 2.0), (Neuroticism, 2.0)],
            &["engineering", "analysis", "planning", "systems", "detail", "discipline"],
            &["Engineer", "Data Analyst", "Accountant", "Project Manager"],
            &["Project Management", "Excel and Data Analysis", "Process Improvement"],
        ),
        profile(
            "Social Leader",
            "Energetic and persuasive; brings people together around a shared goal.",
            &[(Extraversion, 5.0), (Agreeableness, 4.0), (Conscientiousness, 4.0)],
            &["leadership", "management", "communication", "persuasion", "social", "community"],
            &["Sales Manager", "Community Leader", "Public Relations Specialist", "Politician"],
            &["Leadership and Effective Communication", "Community Management", "Negotiation Techniques"],
        ),
        profile(
            "Team Player",
            "Supportive and cooperative; thrives when helping a team succeed.",
            &[(Agreeableness, 5.0), (Extraversion, 4.0), (Neuroticism, 2.0)],
            &["helping", "education", "support", "team", "empathy", "collaboration"],
            &["Teacher", "Social Worker", "Nurse", "Customer Representative"],
            &["Empathy and Active Listening", "Crisis Management", "Introduction to Psychology"],
        ),
        profile(
            "Cool-headed Strategist",
            "Calm under pressure; weighs risks and plans several moves ahead.",
            &[(Neuroticism, 1.0), (Conscientiousness, 5.0), (Openness, 3.0)],
            &["strategy", "finance", "analysis", "logic", "crisis", "risk"],
            &["Financial Advisor", "Crisis Manager", "Business Analyst", "Lawyer"],
            &["Financial Literacy", "Risk Analysis", "Strategic Planning"],
        ),
        profile(
            "Dreamy Artist",
            "Imaginative and sensitive; expresses ideas through art and emotion.",
            &[(Openness, 5.0), (Neuroticism, 4.0), (Agreeableness, 4.0)],
            &["art", "music", "writing", "aesthetics", "emotion", "imagination"],
            &["Painter", "Musician", "Writer", "Actor", "Photographer"],
            &["Art History", "Creative Writing", "Photography Fundamentals"],
        ),
        profile(
            "Scientific Researcher",
            "Inquisitive and rigorous; follows the data wherever it leads.",
            &[(Openness, 4.0), (Conscientiousness, 5.0), (Extraversion, 2.0)],
            &["science", "research", "data", "technology", "curiosity", "inquiry"],
            &["Academic", "Research Assistant", "Data Scientist", "Biotechnologist"],
            &["Scientific Research Methods", "Statistics", "Data Science with Python"],
        ),
        profile(
            "Practical Solver",
            "Hands-on and decisive; fixes what is in front of them quickly.",
            &[(Conscientiousness, 4.0), (Extraversion, 3.0), (Neuroticism, 2.0)],
            &["solution", "operations", "practical", "technical", "fast", "decision"],
            &["Technical Support Specialist", "Operations Manager", "Logistics Manager", "Mechanic"],
            &["Problem Solving Techniques", "Logistics Management", "Basic Mechanics"],
        ),
        profile(
            "Compassionate Caregiver",
            "Warm and attentive; puts the wellbeing of others first.",
            &[(Agreeableness, 5.0), (Neuroticism, 3.0), (Extraversion, 3.0)],
            &["psychology", "health", "people", "compassion", "needs", "care"],
            &["Psychologist", "Counselor", "Child Development Specialist", "Elderly Care Specialist"],
            &["Counseling Skills", "Child Development", "Ethics in Healthcare"],
        ),
        profile(
            "Adventure Seeker",
            "Bold and restless; looks for freedom, travel and new experiences.",
            &[(Extraversion, 5.0), (Openness, 5.0), (Conscientiousness, 2.0)],
            &["adventure", "travel", "sport", "freedom", "experience", "courage"],
            &["Travel Writer", "Outdoor Guide", "Photographer", "Freelancer"],
            &["Outdoor Sports Training", "Freelancing Strategies", "Travel Planning"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = Catalog::builtin();
        assert_eq!(builtin.len(), 10);
        assert!(Catalog::new(builtin.iter().cloned().collect()).is_ok());
    }

    #[test]
    fn test_every_default_coalition_exists() {
        let catalog = Catalog::builtin();
        for t in Trait::ALL {
            assert!(catalog.get(default_coalition_for(t)).is_some(), "{t}");
        }
    }

    #[test]
    fn test_partial_ideal_defaults_to_neutral() {
        let catalog = Catalog::builtin();
        let explorer = catalog.get("Innovative Explorer").unwrap();
        assert_eq!(explorer.ideal.openness, 5.0);
        assert_eq!(explorer.ideal.agreeableness, 3.0);
        assert_eq!(explorer.ideal.neuroticism, 3.0);
    }

    #[test]
    fn test_new_rejects_small_or_duplicate_catalogs() {
        let one = Catalog::builtin().iter().take(1).cloned().collect();
        assert!(Catalog::new(one).is_err());

        let first = Catalog::builtin().iter().next().cloned().unwrap();
        assert!(Catalog::new(vec![first.clone(), first]).is_err());
    }

    #[test]
    fn test_new_rejects_out_of_range_ideal() {
        let mut entries: Vec<CoalitionProfile> = Catalog::builtin().iter().cloned().collect();
        entries[0].ideal.openness = 6.5;
        assert!(Catalog::new(entries).is_err());
    }

    #[test]
    fn test_json_catalog_accepts_partial_ideals() {
        let raw = r#"[
            {"name": "A", "ideal": {"openness": 5}, "careers": ["X", "Y", "Z"],
             "courses": ["C1", "C2", "C3", "C4", "C5"]},
            {"name": "B", "ideal": {"neuroticism": 1}}
        ]"#;
        let coalitions: Vec<CoalitionProfile> = serde_json::from_str(raw).unwrap();
        let catalog = Catalog::new(coalitions).unwrap();
        assert_eq!(catalog.get("B").unwrap().ideal.openness, 3.0);
        assert!(catalog.get("B").unwrap().courses.is_empty());
    }

    #[test]
    fn test_new_rejects_catalog_too_thin_to_backfill() {
        let mut entries: Vec<CoalitionProfile> = Catalog::builtin().iter().take(2).cloned().collect();
        assert!(Catalog::new(entries.clone()).is_ok());
        entries[1].courses = entries[0].courses.clone();
        assert!(Catalog::new(entries).is_err());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.find(" social leader ").unwrap().name, "Social Leader");
        assert!(catalog.find("Imaginary Coalition").is_none());
    }
}
