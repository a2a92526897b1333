//! Explanation Synthesizer
//!
//! Builds one [`Explanation`] per candidate code from:
//! - the ancestor path and neighborhood of the code
//! - case concepts that the matcher resolves onto that path
//! - token salience (external source, else keyword fallback)
//! - an optional narrative from the configured generator
//!
//! The structural part never depends on the generator. A narrative
//! failure only leaves `narrative` empty.

pub mod narrative;
pub mod salience;

pub use narrative::{NarrativeError, NarrativeGenerator, NoNarrative};
pub use salience::{Importance, SalienceSource, SalientTerm};

use crate::hierarchy::HierarchyStore;
use crate::matcher::{MatchResult, SimilarityMatcher};
use crate::paths::{GraphEdge, GraphNode, PathEntry, PathResolver};
use crate::preprocess::CaseContext;
use crate::synonyms::SynonymIndex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const TOP_KEYWORDS: usize = 5;
const SUMMARY_ENTITIES: usize = 3;
const SUMMARY_RELATED: usize = 2;
const CONCEPT_THRESHOLD: f64 = 0.7;
const CONCEPT_RESULTS: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ExplainError {
    #[error("Code not found: {0}")]
    CodeNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub code: String,
    pub name: String,
    pub level: u32,
    /// Caller-supplied prediction probability
    pub probability: f64,
    pub hierarchy_path: Vec<PathEntry>,
    /// Neighbors of the code (the code itself excluded)
    pub related_nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Alias terms registered for the code
    pub aliases: BTreeSet<String>,
    /// Case concepts that resolve onto the code's ancestor path
    pub supporting_concepts: Vec<MatchResult>,
    pub salient_terms: Vec<SalientTerm>,
    pub top_keywords: Vec<String>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

pub struct ExplanationSynthesizer {
    narrator: Arc<dyn NarrativeGenerator>,
    salience: Option<Arc<dyn SalienceSource>>,
    depth: u32,
}

impl ExplanationSynthesizer {
    pub fn new(narrator: Arc<dyn NarrativeGenerator>) -> Self {
        Self {
            narrator,
            salience: None,
            depth: 1,
        }
    }

    /// Synthesizer without a narrative generator
    pub fn structural() -> Self {
        Self::new(Arc::new(NoNarrative))
    }

    pub fn with_salience(mut self, source: Arc<dyn SalienceSource>) -> Self {
        self.salience = Some(source);
        self
    }

    /// Neighborhood depth used for `related_nodes` (default 1)
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn narrator_name(&self) -> &str {
        self.narrator.name()
    }

    /// Full explanation, including a narrative when the generator answers
    pub async fn explain(
        &self,
        store: &HierarchyStore,
        synonyms: &SynonymIndex,
        code: &str,
        context: &CaseContext,
        probability: f64,
    ) -> Result<Explanation, ExplainError> {
        let mut explanation = self.explain_structure(store, synonyms, code, context, probability)?;

        let Some(node) = store.get(&explanation.code) else {
            return Ok(explanation);
        };
        let prompt = narrative::build_prompt(
            context,
            node,
            &explanation.hierarchy_path,
            &explanation.top_keywords,
        );
        match self.narrator.generate(&prompt, narrative::SYSTEM_PROMPT).await {
            Ok(text) if !text.trim().is_empty() => explanation.narrative = Some(text),
            Ok(_) => debug!(code = %explanation.code, "Narrative generator returned empty text"),
            Err(NarrativeError::Unavailable) => {
                debug!(code = %explanation.code, "No narrative generator configured")
            }
            Err(e) => warn!("Narrative for {} omitted: {}", explanation.code, e),
        }
        Ok(explanation)
    }

    /// Everything but the narrative
    pub fn explain_structure(
        &self,
        store: &HierarchyStore,
        synonyms: &SynonymIndex,
        code: &str,
        context: &CaseContext,
        probability: f64,
    ) -> Result<Explanation, ExplainError> {
        let node = store
            .lookup(code)
            .ok_or_else(|| ExplainError::CodeNotFound(code.to_string()))?;

        let resolver = PathResolver::new(store);
        let hierarchy_path = resolver.ancestor_path(&node.code);
        let hood = resolver.neighborhood(&node.code, self.depth).unwrap_or_default();
        let related_nodes: Vec<GraphNode> =
            hood.nodes.into_iter().filter(|n| n.id != node.code).collect();

        let supporting_concepts = supporting_concepts(store, synonyms, context, &hierarchy_path);

        let salient_terms = self
            .salience
            .as_ref()
            .and_then(|source| source.salience(context, &node.code))
            .map(salience::rank_terms)
            .unwrap_or_else(|| salience::keyword_salience(&context.tokens));
        let top_keywords: Vec<String> = salient_terms
            .iter()
            .take(TOP_KEYWORDS)
            .map(|t| t.token.clone())
            .collect();

        let summary = summarize(
            &node.code,
            &node.name,
            &hierarchy_path,
            context,
            &related_nodes,
            &top_keywords,
            probability,
        );

        debug!(
            code = %node.code,
            path = hierarchy_path.len(),
            related = related_nodes.len(),
            concepts = supporting_concepts.len(),
            "Explanation synthesized"
        );

        Ok(Explanation {
            code: node.code.clone(),
            name: node.name.clone(),
            level: node.level,
            probability,
            hierarchy_path,
            related_nodes,
            edges: hood.edges,
            aliases: synonyms.terms_for(&node.code),
            supporting_concepts,
            salient_terms,
            top_keywords,
            summary,
            narrative: None,
        })
    }
}

/// Matches for the case's disease and symptom entities that land on `path`
fn supporting_concepts(
    store: &HierarchyStore,
    synonyms: &SynonymIndex,
    context: &CaseContext,
    path: &[PathEntry],
) -> Vec<MatchResult> {
    let matcher = SimilarityMatcher::new(store, synonyms);
    let on_path: BTreeSet<&str> = path.iter().map(|e| e.code.as_str()).collect();

    let mut supporting: Vec<MatchResult> = Vec::new();
    for entity in context
        .entities
        .diseases
        .iter()
        .chain(&context.entities.symptoms)
    {
        for result in matcher.search(entity, CONCEPT_THRESHOLD, CONCEPT_RESULTS) {
            if on_path.contains(result.code.as_str())
                && !supporting
                    .iter()
                    .any(|s| s.code == result.code && s.matched_term == result.matched_term)
            {
                supporting.push(result);
            }
        }
    }
    supporting
}

/// Deterministic one-paragraph explanation
fn summarize(
    code: &str,
    name: &str,
    path: &[PathEntry],
    context: &CaseContext,
    related: &[GraphNode],
    keywords: &[String],
    probability: f64,
) -> String {
    let mut parts = Vec::new();

    let meaning = if name.is_empty() { "an unnamed code" } else { name };
    parts.push(format!("ICD code {} denotes {}.", code, meaning));

    if !path.is_empty() {
        let names: Vec<&str> = path.iter().map(|e| e.name.as_str()).collect();
        parts.push(format!("It falls under {}.", names.join(" → ")));
    }

    let mut findings = Vec::new();
    let symptoms = &context.entities.symptoms;
    if !symptoms.is_empty() {
        let shown: Vec<&str> = symptoms.iter().take(SUMMARY_ENTITIES).map(String::as_str).collect();
        findings.push(format!("symptoms: {}", shown.join(", ")));
    }
    let diseases = &context.entities.diseases;
    if !diseases.is_empty() {
        let shown: Vec<&str> = diseases.iter().take(SUMMARY_ENTITIES).map(String::as_str).collect();
        findings.push(format!("diseases: {}", shown.join(", ")));
    }
    if !findings.is_empty() {
        parts.push(format!("Case findings supporting it: {}.", findings.join("; ")));
    }

    if !related.is_empty() {
        let labels: Vec<&str> = related
            .iter()
            .take(SUMMARY_RELATED)
            .map(|n| n.label.as_str())
            .collect();
        parts.push(format!("Related codes include {}.", labels.join(", ")));
    }

    if !keywords.is_empty() {
        parts.push(format!("Key terms: {}.", keywords.join(", ")));
    }

    parts.push(format!("Predicted probability: {:.2}%.", probability * 100.0));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Preprocessor;
    use async_trait::async_trait;
    use serde_json::json;

    fn store() -> HierarchyStore {
        HierarchyStore::from_value(json!({
            "410": {"name": "Acute myocardial infarction", "level": 1, "parent": null, "children": ["410.7"]},
            "410.7": {"name": "Subendocardial infarction", "level": 2, "parent": "410", "children": ["410.71"]},
            "410.71": {"name": "Subendocardial infarction, initial episode of care", "level": 3, "parent": "410.7", "children": [], "probability": 0.89}
        }))
        .unwrap()
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl NarrativeGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, NarrativeError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl NarrativeGenerator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, NarrativeError> {
            Err(NarrativeError::Request("connection refused".to_string()))
        }
    }

    struct Attention;

    impl SalienceSource for Attention {
        fn salience(&self, _context: &CaseContext, _code: &str) -> Option<Vec<(String, f64)>> {
            Some(vec![("troponin".to_string(), 0.5), ("ecg".to_string(), 0.9)])
        }
    }

    fn context() -> CaseContext {
        Preprocessor::default().preprocess("Acute chest pain, history of MI, troponin 12")
    }

    #[test]
    fn test_structure() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let explanation = ExplanationSynthesizer::structural()
            .explain_structure(&store, &synonyms, "410.7", &context(), 0.82)
            .unwrap();

        assert_eq!(explanation.code, "410.7");
        assert_eq!(explanation.level, 2);
        let path: Vec<&str> = explanation.hierarchy_path.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(path, vec!["410", "410.7"]);
        let related: Vec<&str> = explanation.related_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(related, vec!["410", "410.71"]);
        assert_eq!(explanation.edges.len(), 2);
        assert!(explanation.top_keywords.len() <= 5);
        assert_eq!(explanation.salient_terms[0].importance, Importance::High);
        assert!(explanation.summary.starts_with("ICD code 410.7 denotes Subendocardial infarction."));
        assert!(explanation.summary.ends_with("Predicted probability: 82.00%."));
        assert!(explanation.narrative.is_none());
    }

    #[test]
    fn test_unknown_code() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let result = ExplanationSynthesizer::structural().explain_structure(
            &store,
            &synonyms,
            "999",
            &CaseContext::default(),
            0.0,
        );
        assert_eq!(result, Err(ExplainError::CodeNotFound("999".to_string())));
    }

    #[test]
    fn test_supporting_concepts_on_path() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let mut context = context();
        context.entities.diseases = vec!["myocardial infarction".to_string()];

        let explanation = ExplanationSynthesizer::structural()
            .explain_structure(&store, &synonyms, "410.71", &context, 0.89)
            .unwrap();
        assert!(explanation
            .supporting_concepts
            .iter()
            .any(|m| m.code == "410"));
    }

    #[test]
    fn test_external_salience_preferred() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let explanation = ExplanationSynthesizer::structural()
            .with_salience(Arc::new(Attention))
            .explain_structure(&store, &synonyms, "410", &context(), 0.75)
            .unwrap();
        assert_eq!(explanation.top_keywords, vec!["ecg", "troponin"]);
    }

    #[tokio::test]
    async fn test_narrative_attached() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let explanation = ExplanationSynthesizer::new(Arc::new(Fixed("Consistent with NSTEMI.")))
            .explain(&store, &synonyms, "410.71", &context(), 0.89)
            .await
            .unwrap();
        assert_eq!(explanation.narrative.as_deref(), Some("Consistent with NSTEMI."));
    }

    #[tokio::test]
    async fn test_narrative_failure_keeps_structure() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let explanation = ExplanationSynthesizer::new(Arc::new(Failing))
            .explain(&store, &synonyms, "410.71", &context(), 0.89)
            .await
            .unwrap();
        assert!(explanation.narrative.is_none());
        assert_eq!(explanation.hierarchy_path.len(), 3);
        assert!(!explanation.summary.is_empty());
    }
}
