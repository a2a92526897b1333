//! Predictor capability
//!
//! The classifier is external; the engine only needs
//! `predict(text) -> ranked candidates`. [`MockPredictor`] stands in
//! for it with a fixed cardiology ranking.

use crate::preprocess::Entities;
use serde::{Deserialize, Serialize};

/// One predicted code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    #[serde(default, alias = "description")]
    pub name: String,
    #[serde(default)]
    pub probability: f64,
}

impl Candidate {
    pub fn new(code: impl Into<String>, name: impl Into<String>, probability: f64) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            probability,
        }
    }
}

impl crate::paths::CodeRef for Candidate {
    fn code_ref(&self) -> &str {
        &self.code
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictParams {
    pub top_k: usize,
    /// Candidates below this probability are dropped
    pub threshold: f64,
}

impl Default for PredictParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: 0.5,
        }
    }
}

/// Ranked candidates plus the entities the model recognized
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Prediction {
    pub model: String,
    pub candidates: Vec<Candidate>,
    pub entities: Entities,
}

pub trait Predictor: Send + Sync {
    fn model(&self) -> &str;

    /// Candidates ordered by probability, highest first
    fn predict(&self, text: &str, params: &PredictParams) -> Prediction;
}

const MOCK_RANKING: &[(&str, &str, f64)] = &[
    ("410.71", "Subendocardial infarction, initial episode of care", 0.89),
    ("410.7", "Subendocardial infarction", 0.82),
    ("410", "Acute myocardial infarction", 0.75),
    ("428.0", "Congestive heart failure, unspecified", 0.68),
    ("414.01", "Coronary atherosclerosis of native coronary artery", 0.61),
    ("412", "Old myocardial infarction", 0.54),
    ("414.0", "Coronary atherosclerosis", 0.47),
    ("427.31", "Atrial fibrillation", 0.43),
    ("428.1", "Left heart failure", 0.39),
    ("424.1", "Aortic valve disorders", 0.35),
];

/// Fixed ranking, independent of the input text
#[derive(Debug, Clone)]
pub struct MockPredictor {
    model: String,
}

impl MockPredictor {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    fn entities() -> Entities {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Entities {
            diseases: owned(&["myocardial infarction", "heart failure", "coronary artery disease"]),
            symptoms: owned(&["chest pain", "shortness of breath", "fatigue"]),
            procedures: owned(&["echocardiogram", "cardiac catheterization", "ecg"]),
            medications: owned(&["aspirin", "atorvastatin", "metoprolol"]),
        }
    }
}

impl Default for MockPredictor {
    fn default() -> Self {
        Self::new("CAML")
    }
}

impl Predictor for MockPredictor {
    fn model(&self) -> &str {
        &self.model
    }

    fn predict(&self, _text: &str, params: &PredictParams) -> Prediction {
        let candidates = MOCK_RANKING
            .iter()
            .filter(|(_, _, p)| *p >= params.threshold)
            .take(params.top_k)
            .map(|(code, name, p)| Candidate::new(*code, *name, *p))
            .collect();

        Prediction {
            model: self.model.clone(),
            candidates,
            entities: Self::entities(),
        }
    }
}
