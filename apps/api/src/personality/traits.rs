//! Trait Scorer: Big Five trait vector and the answer → vector computation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::personality::questions::{AnswerRecord, QuestionBank};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;
pub const NEUTRAL_SCORE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl Trait {
    /// Canonical order. Ties between traits always resolve in this order.
    pub const ALL: [Trait; 5] = [
        Trait::Openness,
        Trait::Conscientiousness,
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Neuroticism,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trait::Openness => "Openness",
            Trait::Conscientiousness => "Conscientiousness",
            Trait::Extraversion => "Extraversion",
            Trait::Agreeableness => "Agreeableness",
            Trait::Neuroticism => "Neuroticism",
        }
    }

    /// Case-insensitive lookup used for untrusted payload keys.
    pub fn from_name(name: &str) -> Option<Trait> {
        let name = name.trim();
        Trait::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Five trait scores, each in [1, 5].
///
/// Missing keys deserialize to the neutral 3.0, which is also how partial
/// coalition ideals in the catalog are completed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitVector {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl Default for TraitVector {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl TraitVector {
    pub const NEUTRAL: TraitVector = TraitVector {
        openness: NEUTRAL_SCORE,
        conscientiousness: NEUTRAL_SCORE,
        extraversion: NEUTRAL_SCORE,
        agreeableness: NEUTRAL_SCORE,
        neuroticism: NEUTRAL_SCORE,
    };

    pub fn get(&self, t: Trait) -> f64 {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
        }
    }

    /// Sets a trait, clamping into [1, 5].
    pub fn set(&mut self, t: Trait, value: f64) {
        let value = value.clamp(MIN_SCORE, MAX_SCORE);
        match t {
            Trait::Openness => self.openness = value,
            Trait::Conscientiousness => self.conscientiousness = value,
            Trait::Extraversion => self.extraversion = value,
            Trait::Agreeableness => self.agreeableness = value,
            Trait::Neuroticism => self.neuroticism = value,
        }
    }

    /// Traits sorted by score, highest first. Stable: ties keep canonical order.
    pub fn ranked(&self) -> Vec<(Trait, f64)> {
        let mut ranked: Vec<(Trait, f64)> = Trait::ALL.iter().map(|&t| (t, self.get(t))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn highest(&self) -> Trait {
        self.ranked()[0].0
    }

    /// Lowest-scoring trait; ties resolve to the earliest in canonical order.
    pub fn lowest(&self) -> Trait {
        Trait::ALL
            .into_iter()
            .fold(Trait::Openness, |lowest, t| {
                if self.get(t) < self.get(lowest) {
                    t
                } else {
                    lowest
                }
            })
    }

    /// Euclidean distance over all five dimensions.
    pub fn distance(&self, other: &TraitVector) -> f64 {
        Trait::ALL
            .iter()
            .map(|&t| (self.get(t) - other.get(t)).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Computes the trait vector for a set of answers.
///
/// Reverse-scored questions contribute `6 - raw`. Each trait is the mean of its
/// contributions rounded to two decimals; a trait nobody answered is exactly 3.0.
/// Answers for unknown or interest-only questions are ignored.
pub fn score_traits(answers: &[AnswerRecord], questions: &QuestionBank) -> TraitVector {
    let mut sums = [0u32; 5];
    let mut counts = [0u32; 5];

    for answer in answers {
        let Some(question) = questions.get(answer.question_id()) else {
            continue;
        };
        let Some(t) = question.trait_name else {
            continue;
        };
        let raw = u32::from(answer.value());
        let value = if question.reverse { 6 - raw } else { raw };
        let idx = t as usize;
        sums[idx] += value;
        counts[idx] += 1;
    }

    let mut vector = TraitVector::NEUTRAL;
    for t in Trait::ALL {
        let idx = t as usize;
        if counts[idx] > 0 {
            vector.set(t, round2(f64::from(sums[idx]) / f64::from(counts[idx])));
        }
    }
    vector
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str, value: u8) -> AnswerRecord {
        AnswerRecord::new(id, value).unwrap()
    }

    fn all_personality_answers(value: u8) -> Vec<AnswerRecord> {
        QuestionBank::builtin()
            .personality()
            .map(|q| answer(&q.id, value))
            .collect()
    }

    #[test]
    fn test_all_neutral_answers_score_three() {
        let bank = QuestionBank::builtin();
        let answers = all_personality_answers(3);
        assert_eq!(answers.len(), 20);
        assert_eq!(score_traits(&answers, &bank), TraitVector::NEUTRAL);
    }

    #[test]
    fn test_trait_without_answers_defaults_to_neutral() {
        let bank = QuestionBank::builtin();
        // P7, P8, P14 are Openness only
        let answers = vec![answer("P7", 5), answer("P8", 5), answer("P14", 4)];
        let scores = score_traits(&answers, &bank);
        assert_eq!(scores.openness, 4.67);
        assert_eq!(scores.conscientiousness, 3.0);
        assert_eq!(scores.extraversion, 3.0);
        assert_eq!(scores.agreeableness, 3.0);
        assert_eq!(scores.neuroticism, 3.0);
    }

    #[test]
    fn test_reverse_scored_question_is_inverted() {
        let bank = QuestionBank::builtin();
        // P2 is reverse-scored Conscientiousness
        let scores = score_traits(&[answer("P2", 5)], &bank);
        assert_eq!(scores.conscientiousness, 1.0);
        let scores = score_traits(&[answer("P2", 1), answer("P1", 4)], &bank);
        assert_eq!(scores.conscientiousness, 4.5);
    }

    #[test]
    fn test_unknown_and_interest_answers_are_ignored() {
        let bank = QuestionBank::builtin();
        let scores = score_traits(&[answer("I3", 5), answer("ZZ9", 1)], &bank);
        assert_eq!(scores, TraitVector::NEUTRAL);
    }

    #[test]
    fn test_scoring_is_order_independent() {
        let bank = QuestionBank::builtin();
        let mut answers: Vec<AnswerRecord> = bank
            .personality()
            .enumerate()
            .map(|(i, q)| answer(&q.id, (i % 5) as u8 + 1))
            .collect();
        let forward = score_traits(&answers, &bank);
        answers.reverse();
        assert_eq!(score_traits(&answers, &bank), forward);
    }

    #[test]
    fn test_extreme_answers_stay_in_range() {
        let bank = QuestionBank::builtin();
        for value in [1, 5] {
            let scores = score_traits(&all_personality_answers(value), &bank);
            for t in Trait::ALL {
                let s = scores.get(t);
                assert!((MIN_SCORE..=MAX_SCORE).contains(&s), "{t} = {s}");
            }
        }
    }

    #[test]
    fn test_ranked_is_stable_on_ties() {
        let ranked = TraitVector::NEUTRAL.ranked();
        let order: Vec<Trait> = ranked.iter().map(|(t, _)| *t).collect();
        assert_eq!(order, Trait::ALL.to_vec());
    }

    #[test]
    fn test_highest_and_lowest() {
        let mut v = TraitVector::NEUTRAL;
        v.set(Trait::Agreeableness, 4.5);
        v.set(Trait::Neuroticism, 1.5);
        assert_eq!(v.highest(), Trait::Agreeableness);
        assert_eq!(v.lowest(), Trait::Neuroticism);
        assert_eq!(TraitVector::NEUTRAL.lowest(), Trait::Openness);
    }

    #[test]
    fn test_set_clamps_into_range() {
        let mut v = TraitVector::NEUTRAL;
        v.set(Trait::Openness, 9.0);
        v.set(Trait::Extraversion, -2.0);
        assert_eq!(v.openness, 5.0);
        assert_eq!(v.extraversion, 1.0);
    }

    #[test]
    fn test_partial_vector_deserializes_with_neutral_defaults() {
        let v: TraitVector = serde_json::from_str(r#"{"openness": 5}"#).unwrap();
        assert_eq!(v.openness, 5.0);
        assert_eq!(v.neuroticism, 3.0);
    }

    #[test]
    fn test_trait_from_name_is_case_insensitive() {
        assert_eq!(Trait::from_name("openness"), Some(Trait::Openness));
        assert_eq!(Trait::from_name(" NEUROTICISM "), Some(Trait::Neuroticism));
        assert_eq!(Trait::from_name("Honesty"), None);
    }
}
