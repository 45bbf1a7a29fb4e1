//! Static questionnaire: 20 Big Five questions followed by 15 interest questions.

use serde::{Deserialize, Serialize};

use crate::personality::traits::Trait;

pub const QUESTIONS_PER_PAGE: usize = 5;
pub const LIKERT_MIN: u8 = 1;
pub const LIKERT_MAX: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// Set for personality questions; interest questions carry a category instead.
    #[serde(rename = "trait", skip_serializing_if = "Option::is_none")]
    pub trait_name: Option<Trait>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// (id, trait, reverse, text)
const PERSONALITY_QUESTIONS: &[(&str, Trait, bool, &str)] = &[
    ("P1", Trait::Conscientiousness, false, "I do my work carefully and in an orderly way."),
    ("P2", Trait::Conscientiousness, true, "I prefer to work without making a plan."),
    ("P3", Trait::Extraversion, false, "I feel comfortable in social settings."),
    ("P4", Trait::Extraversion, false, "Meeting new people excites me."),
    ("P5", Trait::Neuroticism, true, "I usually stay calm in stressful situations."),
    ("P6", Trait::Neuroticism, false, "I worry too much about small things."),
    ("P7", Trait::Openness, false, "I like finding creative solutions in my work."),
    ("P8", Trait::Openness, false, "I try to understand different points of view."),
    ("P9", Trait::Agreeableness, false, "I prioritise the needs of others."),
    ("P10", Trait::Agreeableness, false, "I try to find common ground in conflicts."),
    ("P11", Trait::Conscientiousness, false, "I finish my tasks on time."),
    ("P12", Trait::Neuroticism, false, "My mood changes often."),
    ("P13", Trait::Extraversion, false, "I enjoy speaking in front of a group."),
    ("P14", Trait::Openness, false, "Thinking about abstract and theoretical topics interests me."),
    ("P15", Trait::Agreeableness, false, "I believe people are well-intentioned."),
    ("P16", Trait::Extraversion, true, "I hold back from expressing myself."),
    ("P17", Trait::Conscientiousness, false, "Once I start something I see it through to the end."),
    ("P18", Trait::Neuroticism, false, "I am sensitive to criticism."),
    ("P19", Trait::Conscientiousness, false, "I keep my workspace tidy."),
    ("P20", Trait::Agreeableness, false, "Helping others makes me happy."),
];

/// (id, category, text)
const INTEREST_QUESTIONS: &[(&str, &str, &str)] = &[
    ("I1", "Creativity", "I enjoy engaging with art."),
    ("I2", "Physical", "I enjoy doing sports."),
    ("I3", "Nature", "Nature walks and camping appeal to me."),
    ("I4", "Technology", "Technology and innovation interest me."),
    ("I5", "Creativity", "I like writing creative pieces and stories."),
    ("I6", "Art", "Listening to or playing music does me good."),
    ("I7", "Social", "I would like to take part in community service or volunteering."),
    ("I8", "Science", "I enjoy reading scientific articles."),
    ("I9", "Adventure", "I like travelling."),
    ("I10", "Creativity", "I like taking and editing photos."),
    ("I11", "Social", "Chatting with people and making new friends interests me."),
    ("I12", "Creativity", "Handicrafts give me a sense of calm."),
    ("I13", "Entertainment", "I like playing games, on a board or a computer."),
    ("I14", "Social", "Getting to know other cultures interests me."),
    ("I15", "Leadership", "I like tasks that require leadership."),
];

/// Read-only question catalog injected into the engine.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn builtin() -> Self {
        let personality = PERSONALITY_QUESTIONS
            .iter()
            .map(|&(id, t, reverse, text)| Question {
                id: id.to_string(),
                text: text.to_string(),
                trait_name: Some(t),
                reverse,
                category: None,
            });
        let interests = INTEREST_QUESTIONS.iter().map(|&(id, category, text)| Question {
            id: id.to_string(),
            text: text.to_string(),
            trait_name: None,
            reverse: false,
            category: Some(category.to_string()),
        });
        Self {
            questions: personality.chain(interests).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn personality(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.trait_name.is_some())
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn total_pages(&self) -> usize {
        self.questions.len().div_ceil(QUESTIONS_PER_PAGE)
    }

    /// 1-based page of questions; `None` past the last page.
    pub fn page(&self, page: usize) -> Option<&[Question]> {
        if page == 0 || page > self.total_pages() {
            return None;
        }
        let start = (page - 1) * QUESTIONS_PER_PAGE;
        let end = (start + QUESTIONS_PER_PAGE).min(self.questions.len());
        Some(&self.questions[start..end])
    }
}

/// One submitted answer. The Likert value is validated on construction,
/// including when deserialized from a request body or a stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAnswer")]
pub struct AnswerRecord {
    question_id: String,
    #[serde(rename = "answer_value")]
    value: u8,
}

/// Wire shape of an answer before validation.
#[derive(Deserialize)]
pub struct RawAnswer {
    question_id: String,
    answer_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("answer for {question_id} must be between 1 and 5, got {value}")]
    OutOfRange { question_id: String, value: i64 },

    #[error("question id must not be empty")]
    EmptyQuestionId,
}

impl AnswerRecord {
    pub fn new(question_id: impl Into<String>, value: u8) -> Result<Self, AnswerError> {
        Self::try_from(RawAnswer {
            question_id: question_id.into(),
            answer_value: i64::from(value),
        })
    }

    pub fn question_id(&self) -> &str {
        &self.question_id
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl TryFrom<RawAnswer> for AnswerRecord {
    type Error = AnswerError;

    fn try_from(raw: RawAnswer) -> Result<Self, Self::Error> {
        let question_id = raw.question_id.trim().to_string();
        if question_id.is_empty() {
            return Err(AnswerError::EmptyQuestionId);
        }
        let value = u8::try_from(raw.answer_value)
            .ok()
            .filter(|v| (LIKERT_MIN..=LIKERT_MAX).contains(v))
            .ok_or(AnswerError::OutOfRange {
                question_id: question_id.clone(),
                value: raw.answer_value,
            })?;
        Ok(Self { question_id, value })
    }
}
