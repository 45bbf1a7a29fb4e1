//! Coalition Matcher: ranks catalog entries by closeness to a trait vector.
//!
//! Score = max(0, (5 - euclidean distance) * 2), rounded to two decimals, plus
//! a flat bonus for every keyword shared with the coalition. The same function
//! serves demographics submission and final report composition.

use serde::{Deserialize, Serialize};

use crate::personality::catalog::{default_coalition_for, Catalog};
use crate::personality::traits::{round2, TraitVector};

pub const KEYWORD_BONUS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionMatch {
    pub name: String,
    pub score: f64,
    pub keyword_hits: Vec<String>,
}

impl CoalitionMatch {
    /// Score expressed as a 0–100 percentage for display.
    pub fn match_percent(&self) -> u8 {
        (self.score * 10.0).clamp(0.0, 100.0).round() as u8
    }
}

/// Ranks every catalog entry, best first. Ties keep catalog order.
///
/// `keywords` are expected lowercase; each one found in a coalition's keyword
/// set adds `KEYWORD_BONUS`.
pub fn rank_coalitions(
    vector: &TraitVector,
    catalog: &Catalog,
    keywords: &[String],
) -> Vec<CoalitionMatch> {
    let mut ranked: Vec<CoalitionMatch> = catalog
        .iter()
        .map(|coalition| {
            let base = round2(((5.0 - vector.distance(&coalition.ideal)) * 2.0).max(0.0));
            let keyword_hits: Vec<String> = coalition
                .keywords
                .iter()
                .filter(|k| keywords.iter().any(|kw| kw.eq_ignore_ascii_case(k)))
                .cloned()
                .collect();
            CoalitionMatch {
                name: coalition.name.clone(),
                score: round2(base + KEYWORD_BONUS * keyword_hits.len() as f64),
                keyword_hits,
            }
        })
        .collect();

    // sort_by is stable, so equal scores stay in catalog order
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Reduces a candidate list to exactly two distinct catalog names.
///
/// Unknown and repeated names are dropped. If fewer than two remain, the list
/// is padded with the default coalition for the highest trait, then with the
/// next unused catalog entries in order.
pub fn select_two(candidates: &[&str], vector: &TraitVector, catalog: &Catalog) -> [String; 2] {
    let mut picked: Vec<String> = Vec::with_capacity(2);
    let push = |name: &str, picked: &mut Vec<String>| {
        if picked.len() < 2 && !picked.iter().any(|p| p == name) {
            picked.push(name.to_string());
        }
    };

    for candidate in candidates {
        if let Some(coalition) = catalog.find(candidate) {
            push(&coalition.name, &mut picked);
        }
    }
    if picked.len() < 2 {
        if let Some(coalition) = catalog.get(default_coalition_for(vector.highest())) {
            push(&coalition.name, &mut picked);
        }
    }
    for coalition in catalog.iter() {
        if picked.len() == 2 {
            break;
        }
        push(&coalition.name, &mut picked);
    }

    let mut picked = picked.into_iter();
    // Catalog::new guarantees at least two entries, so both slots are filled.
    let first = picked.next().unwrap_or_default();
    let second = picked.next().unwrap_or_default();
    [first, second]
}

/// The two best coalitions for a vector, with their scores.
pub fn top_two(vector: &TraitVector, catalog: &Catalog, keywords: &[String]) -> [CoalitionMatch; 2] {
    let ranked = rank_coalitions(vector, catalog, keywords);
    let names: Vec<&str> = ranked.iter().map(|m| m.name.as_str()).collect();
    select_two(&names, vector, catalog).map(|name| {
        ranked
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .unwrap_or(CoalitionMatch {
                name,
                score: 0.0,
                keyword_hits: Vec::new(),
            })
    })
}
