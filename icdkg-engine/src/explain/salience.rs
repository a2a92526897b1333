//! Token salience for explanations

use crate::preprocess::CaseContext;
use serde::Serialize;
use std::collections::HashSet;

/// Tokens that weigh most in the keyword fallback
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "heart", "cardiac", "myocardial", "infarction", "chest", "pain", "acute", "coronary", "artery",
    "disease", "attack",
];

const KEYWORD_WEIGHT: f64 = 0.8;
const NUMERIC_WEIGHT: f64 = 0.3;
const OTHER_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    pub fn from_weight(weight: f64) -> Self {
        if weight > 0.7 {
            Importance::High
        } else if weight > 0.4 {
            Importance::Medium
        } else {
            Importance::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalientTerm {
    pub token: String,
    pub weight: f64,
    pub importance: Importance,
}

/// External token-attribution capability (e.g. model attention)
///
/// `None` means no signal for this case; the keyword fallback is used.
pub trait SalienceSource: Send + Sync {
    fn salience(&self, context: &CaseContext, code: &str) -> Option<Vec<(String, f64)>>;
}

/// Rank (token, weight) pairs, highest weight first, ties in input order
pub fn rank_terms(weighted: Vec<(String, f64)>) -> Vec<SalientTerm> {
    let mut terms: Vec<SalientTerm> = weighted
        .into_iter()
        .map(|(token, weight)| SalientTerm {
            importance: Importance::from_weight(weight),
            token,
            weight,
        })
        .collect();
    terms.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    terms
}

/// Deterministic fallback: domain keywords 0.8, numbers 0.3, anything
/// else 0.1, normalized so the top token weighs 1.0
pub fn keyword_salience(tokens: &[String]) -> Vec<SalientTerm> {
    let mut seen = HashSet::new();
    let raw: Vec<(String, f64)> = tokens
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .map(|token| {
            let weight = if DOMAIN_KEYWORDS.contains(&token.as_str()) {
                KEYWORD_WEIGHT
            } else if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
                NUMERIC_WEIGHT
            } else {
                OTHER_WEIGHT
            };
            (token.clone(), weight)
        })
        .collect();

    let max = raw.iter().map(|(_, w)| *w).fold(0.0, f64::max);
    let normalized = raw
        .into_iter()
        .map(|(token, weight)| (token, if max > 0.0 { weight / max } else { weight }))
        .collect();
    rank_terms(normalized)
}
