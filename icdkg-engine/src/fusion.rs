//! Prediction Fusion
//!
//! Weighted-sum merge of candidate rankings from several inference
//! sources. No normalization beyond the supplied weights; pass weights
//! that sum to 1 if the result should read as a probability.

use crate::predictor::Candidate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("Expected {expected} weights (one per ranking), got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionCandidate {
    pub code: String,
    pub name: String,
    /// Weighted sum over every ranking that proposed the code
    pub probability: f64,
    /// Number of rankings that proposed the code
    pub source_count: usize,
}

impl crate::paths::CodeRef for FusionCandidate {
    fn code_ref(&self) -> &str {
        &self.code
    }
}

/// Merge rankings into one, highest aggregate probability first
///
/// Omitted weights default to `1 / rankings.len()` each. Ties keep the
/// order in which codes were first seen.
pub fn fuse(
    rankings: &[Vec<Candidate>],
    weights: Option<&[f64]>,
) -> Result<Vec<FusionCandidate>, FusionError> {
    if rankings.is_empty() {
        return Ok(Vec::new());
    }

    let weights: Vec<f64> = match weights {
        Some(w) if w.len() != rankings.len() => {
            return Err(FusionError::WeightCountMismatch {
                expected: rankings.len(),
                actual: w.len(),
            })
        }
        Some(w) => w.to_vec(),
        None => vec![1.0 / rankings.len() as f64; rankings.len()],
    };

    let mut merged: Vec<FusionCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (ranking, weight) in rankings.iter().zip(&weights) {
        let mut proposed: HashSet<&str> = HashSet::new();
        for candidate in ranking {
            let slot = *index.entry(candidate.code.clone()).or_insert_with(|| {
                merged.push(FusionCandidate {
                    code: candidate.code.clone(),
                    name: String::new(),
                    probability: 0.0,
                    source_count: 0,
                });
                merged.len() - 1
            });
            let entry = &mut merged[slot];
            if entry.name.is_empty() {
                entry.name = candidate.name.clone();
            }
            entry.probability += candidate.probability * weight;
            if proposed.insert(candidate.code.as_str()) {
                entry.source_count += 1;
            }
        }
    }

    merged.sort_by(|a, b| b.probability.total_cmp(&a.probability));

    debug!(
        sources = rankings.len(),
        candidates = merged.len(),
        "Fused candidate rankings"
    );
    Ok(merged)
}
