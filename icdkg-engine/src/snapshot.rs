//! Prediction snapshots
//!
//! A snapshot records one prediction run in the envelope format the
//! taxonomy loader understands: run metadata, the raw predictions and an
//! `icd_hierarchy` derived from the predicted codes.

use crate::hierarchy::{segments, HierarchyStore};
use crate::predictor::{Candidate, Prediction};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotNode {
    pub code: String,
    pub name: String,
    pub level: u32,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSnapshot {
    pub timestamp: String,
    pub original_text: String,
    pub model: String,
    pub top_k: usize,
    pub threshold: f64,
    pub predictions: Value,
    pub icd_hierarchy: BTreeMap<String, SnapshotNode>,
}

/// Codes from the root category down to `code`, e.g. `410`, `410.7`, `410.71`
pub fn code_prefixes(code: &str) -> Vec<String> {
    let parts = segments(code);
    let Some((category, subdivision)) = parts.split_first() else {
        return Vec::new();
    };

    let mut prefixes = vec![category.to_string()];
    let mut digits = String::new();
    for part in subdivision {
        digits.push_str(part);
        prefixes.push(format!("{}.{}", category, digits));
    }
    // Keep the code exactly as given for the leaf
    if let Some(last) = prefixes.last_mut() {
        *last = code.to_string();
    }
    prefixes
}

impl PredictionSnapshot {
    /// Build a snapshot from one prediction run
    ///
    /// Every prefix of a predicted code becomes a node. Names and
    /// probabilities come from the candidates when the prefix was itself
    /// predicted; otherwise the name is looked up in `names` if given.
    pub fn from_candidates(
        original_text: &str,
        prediction: &Prediction,
        top_k: usize,
        threshold: f64,
        names: Option<&HierarchyStore>,
    ) -> Self {
        let mut hierarchy: BTreeMap<String, SnapshotNode> = BTreeMap::new();

        for candidate in &prediction.candidates {
            if candidate.code.trim().is_empty() {
                continue;
            }
            let prefixes = code_prefixes(&candidate.code);
            for (i, prefix) in prefixes.iter().enumerate() {
                let parent = i.checked_sub(1).map(|p| prefixes[p].clone());

                hierarchy.entry(prefix.clone()).or_insert_with(|| SnapshotNode {
                    code: prefix.clone(),
                    name: name_for(prefix, &prediction.candidates, names),
                    level: i as u32 + 1,
                    parent: parent.clone(),
                    children: Vec::new(),
                    probability: probability_for(prefix, &prediction.candidates),
                });

                if let Some(parent) = parent {
                    if let Some(node) = hierarchy.get_mut(&parent) {
                        if !node.children.contains(prefix) {
                            node.children.push(prefix.clone());
                        }
                    }
                }
            }
        }

        let predictions = json!({
            "icdPredictions": prediction
                .candidates
                .iter()
                .map(|c| json!({"code": c.code, "description": c.name, "probability": c.probability}))
                .collect::<Vec<_>>(),
            "entities": prediction.entities,
        });

        Self {
            timestamp: Utc::now().to_rfc3339(),
            original_text: original_text.to_string(),
            model: prediction.model.clone(),
            top_k,
            threshold,
            predictions,
            icd_hierarchy: hierarchy,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Write as pretty JSON, creating parent directories as needed
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!(
            "Prediction snapshot written to {} ({} codes)",
            path.display(),
            self.icd_hierarchy.len()
        );
        Ok(())
    }
}

fn name_for(code: &str, candidates: &[Candidate], names: Option<&HierarchyStore>) -> String {
    candidates
        .iter()
        .find(|c| c.code == code && !c.name.is_empty())
        .map(|c| c.name.clone())
        .or_else(|| names.and_then(|store| store.get(code)).map(|n| n.name.clone()))
        .unwrap_or_default()
}

fn probability_for(code: &str, candidates: &[Candidate]) -> f64 {
    candidates
        .iter()
        .filter(|c| c.code == code)
        .map(|c| c.probability)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{MockPredictor, PredictParams, Predictor};

    #[test]
    fn test_code_prefixes() {
        assert_eq!(code_prefixes("410.71"), vec!["410", "410.7", "410.71"]);
        assert_eq!(code_prefixes("412"), vec!["412"]);
        assert_eq!(code_prefixes("V45.81"), vec!["V45", "V45.8", "V45.81"]);
    }

    #[test]
    fn test_snapshot_hierarchy_is_consistent() {
        let prediction = MockPredictor::default().predict("chest pain", &PredictParams::default());
        let snapshot = PredictionSnapshot::from_candidates("chest pain", &prediction, 10, 0.5, None);

        let node = &snapshot.icd_hierarchy["410.7"];
        assert_eq!(node.parent.as_deref(), Some("410"));
        assert_eq!(node.children, vec!["410.71".to_string()]);
        assert_eq!(node.probability, 0.82);
        // 414.0 was filtered by the threshold, so it is an unnamed intermediate node
        assert_eq!(snapshot.icd_hierarchy["414.0"].name, "");
        assert_eq!(snapshot.icd_hierarchy["414.0"].probability, 0.0);

        let store = HierarchyStore::from_value(snapshot.to_value()).unwrap();
        assert!(store.issues().is_empty(), "issues: {:?}", store.issues());
        assert_eq!(store.snapshot_metadata().unwrap().model, "CAML");
        assert_eq!(store.get("410.71").unwrap().salience, 0.89);
    }

    #[test]
    fn test_names_filled_from_store() {
        let prediction = MockPredictor::default().predict("", &PredictParams::default());
        let builtin = HierarchyStore::builtin();
        let snapshot = PredictionSnapshot::from_candidates("", &prediction, 10, 0.5, Some(&builtin));
        assert_eq!(snapshot.icd_hierarchy["414.0"].name, "Coronary atherosclerosis");
    }

    #[test]
    fn test_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("icd_hierarchy.json");
        let prediction = MockPredictor::default().predict("", &PredictParams::default());
        PredictionSnapshot::from_candidates("case", &prediction, 10, 0.5, None)
            .write_to(&path)
            .unwrap();

        let store = HierarchyStore::load(&path).unwrap();
        assert_eq!(store.snapshot_metadata().unwrap().original_text, "case");
        assert!(store.get("428.0").is_some());
    }
}
