//! Similarity Matcher
//!
//! Ranks taxonomy codes against a free-text concept. Three layers, in
//! priority order:
//! 1. alias match against the [`SynonymIndex`] (fixed 0.9)
//! 2. name similarity against every node's display name
//! 3. synonym-chain expansion through the curated dictionary,
//!    attenuated by 0.9 per hop
//!
//! Results are unique by code (the earliest layer wins), sorted by
//! similarity descending with ties in discovery order.

mod dictionary;

pub use dictionary::synonyms_of;

use crate::hierarchy::{CodeNode, HierarchyStore};
use crate::synonyms::SynonymIndex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Similarity assigned to an alias hit
pub const ALIAS_SIMILARITY: f64 = 0.9;
/// Similarity assigned when one name contains the other
pub const SUBSTRING_SIMILARITY: f64 = 0.8;
/// Attenuation applied to each synonym-chain hop
pub const CHAIN_ATTENUATION: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchSource {
    Synonym,
    HierarchyName,
    TransitiveSynonym,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub code: String,
    pub name: String,
    pub matched_term: String,
    pub similarity: f64,
    pub source: MatchSource,
}

impl MatchResult {
    fn from_node(node: &CodeNode, matched_term: String, similarity: f64, source: MatchSource) -> Self {
        Self {
            code: node.code.clone(),
            name: node.name.clone(),
            matched_term,
            similarity,
            source,
        }
    }
}

/// Similarity of two lowercased strings
///
/// 0.8 if either contains the other, else Jaccard over whitespace tokens.
/// An empty string scores 0 against anything.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return SUBSTRING_SIMILARITY;
    }

    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

pub struct SimilarityMatcher<'a> {
    store: &'a HierarchyStore,
    synonyms: &'a SynonymIndex,
}

impl<'a> SimilarityMatcher<'a> {
    pub fn new(store: &'a HierarchyStore, synonyms: &'a SynonymIndex) -> Self {
        Self { store, synonyms }
    }

    /// Rank codes against `concept`
    ///
    /// `threshold` gates the name-similarity layer only; alias hits and
    /// chained results are always eligible.
    pub fn search(&self, concept: &str, threshold: f64, max_results: usize) -> Vec<MatchResult> {
        let mut path = HashSet::new();
        let results = self.search_term(concept, threshold, max_results, &mut path);
        debug!(concept, threshold, results = results.len(), "Semantic search finished");
        results
    }

    fn search_term(
        &self,
        concept: &str,
        threshold: f64,
        max_results: usize,
        path: &mut HashSet<String>,
    ) -> Vec<MatchResult> {
        let needle = concept.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<MatchResult> = Vec::new();

        for (code, entry) in self.synonyms.entries() {
            let Some(node) = self.store.lookup(code) else {
                continue;
            };
            for term in entry.terms() {
                if term.to_lowercase().contains(&needle) {
                    results.push(MatchResult::from_node(
                        node,
                        term.to_string(),
                        ALIAS_SIMILARITY,
                        MatchSource::Synonym,
                    ));
                }
            }
        }

        for node in self.store.iter() {
            if results.iter().any(|r| r.code == node.code) {
                continue;
            }
            let score = name_similarity(&needle, &node.name.to_lowercase());
            if score >= threshold && score > 0.0 {
                results.push(MatchResult::from_node(
                    node,
                    node.name.clone(),
                    score,
                    MatchSource::HierarchyName,
                ));
            }
        }

        // `path` holds the terms on the current chain only, so sibling
        // synonyms are each expanded from this term exactly once.
        path.insert(needle.clone());
        for synonym in synonyms_of(&needle) {
            if path.contains(*synonym) {
                continue;
            }
            for mut chained in self.search_term(synonym, threshold, max_results, path) {
                chained.matched_term = format!("{} (via {})", concept.trim(), synonym);
                chained.similarity = (chained.similarity * CHAIN_ATTENUATION).min(1.0);
                chained.source = MatchSource::TransitiveSynonym;
                merge_chained(&mut results, chained);
            }
        }
        path.remove(&needle);

        rank(results, max_results)
    }

    /// Plain substring search over codes and names
    ///
    /// Matches when the lowercased query is contained in the code or the
    /// lowercased name. Stops after `limit` hits, in code order.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Vec<&'a CodeNode> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.store
            .iter()
            .filter(|node| node.code.contains(&needle) || node.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

/// Add a chained hit unless its code is already covered
///
/// Alias and name hits always win. Between chained hits the higher
/// similarity wins; ties keep the earlier one.
fn merge_chained(results: &mut Vec<MatchResult>, chained: MatchResult) {
    match results.iter_mut().find(|r| r.code == chained.code) {
        None => results.push(chained),
        Some(existing)
            if existing.source == MatchSource::TransitiveSynonym
                && chained.similarity > existing.similarity =>
        {
            *existing = chained;
        }
        Some(_) => {}
    }
}

/// Deduplicate by code (first wins), sort by similarity, truncate
fn rank(results: Vec<MatchResult>, max_results: usize) -> Vec<MatchResult> {
    let mut seen = HashSet::new();
    let mut unique: Vec<MatchResult> = results
        .into_iter()
        .filter(|r| seen.insert(r.code.clone()))
        .collect();
    unique.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    unique.truncate(max_results);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> HierarchyStore {
        HierarchyStore::from_value(json!({
            "410": {"name": "Acute myocardial infarction", "parent": null, "children": ["410.7"]},
            "410.7": {"name": "Subendocardial infarction", "parent": "410", "children": []},
            "428": {"name": "Heart failure", "parent": null, "children": ["428.0"]},
            "428.0": {"name": "Congestive heart failure", "parent": "428", "children": []},
            "486": {"name": "Pneumonia, organism unspecified", "parent": null, "children": []}
        }))
        .unwrap()
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("heart failure", "congestive heart failure"), 0.8);
        assert_eq!(name_similarity("", "heart failure"), 0.0);
        // {acute, heart} ∩ {heart, failure} = 1, union = 3
        let jaccard = name_similarity("acute heart", "heart failure");
        assert!((jaccard - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(name_similarity("fever", "fracture of femur"), 0.0);
    }

    #[test]
    fn test_alias_hit_is_fixed_score() {
        let store = store();
        let synonyms = SynonymIndex::from_value(json!({
            "428.0": {"aliases": ["CHF", "Congestive cardiac failure"]}
        }));
        let results = SimilarityMatcher::new(&store, &synonyms).search("chf", 0.7, 10);
        assert_eq!(results[0].code, "428.0");
        assert_eq!(results[0].similarity, ALIAS_SIMILARITY);
        assert_eq!(results[0].source, MatchSource::Synonym);
        assert_eq!(results[0].matched_term, "CHF");
    }

    #[test]
    fn test_alias_for_unknown_code_is_ignored() {
        let store = store();
        let synonyms = SynonymIndex::from_value(json!({
            "999.9": {"aliases": ["chf"]}
        }));
        let results = SimilarityMatcher::new(&store, &synonyms).search("chf", 0.7, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn test_name_layer_respects_threshold() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let matcher = SimilarityMatcher::new(&store, &synonyms);

        let results = matcher.search("heart failure", 0.7, 10);
        let codes: Vec<&str> = results.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["428", "428.0"]);
        assert!(results.iter().all(|r| r.source == MatchSource::HierarchyName));

        assert!(matcher.search("heart failure", 0.9, 10).is_empty());
    }

    #[test]
    fn test_synonym_chain_attenuates() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let results = SimilarityMatcher::new(&store, &synonyms).search("heart attack", 0.7, 10);

        let mi = results.iter().find(|r| r.code == "410").unwrap();
        assert_eq!(mi.source, MatchSource::TransitiveSynonym);
        assert_eq!(mi.matched_term, "heart attack (via myocardial infarction)");
        assert!((mi.similarity - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_each_direct_synonym_is_attenuated_once() {
        let store = HierarchyStore::from_value(json!({
            "411": {"name": "Other acute ischemic heart disease", "parent": null, "children": []}
        }))
        .unwrap();
        let synonyms = SynonymIndex::from_value(json!({
            "411": {"aliases": ["cardiac infarction NOS"]}
        }));
        let results = SimilarityMatcher::new(&store, &synonyms).search("heart attack", 0.7, 10);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, "411");
        assert_eq!(results[0].source, MatchSource::TransitiveSynonym);
        assert_eq!(results[0].matched_term, "heart attack (via cardiac infarction)");
        assert!((results[0].similarity - 0.81).abs() < 1e-9);
    }

    #[test]
    fn test_cyclic_synonyms_terminate() {
        // heart attack, myocardial infarction and mi all list each other
        let store = store();
        let synonyms = SynonymIndex::new();
        let results = SimilarityMatcher::new(&store, &synonyms).search("mi", 0.7, 10);
        let mi = results.iter().find(|r| r.code == "410").unwrap();
        assert!((mi.similarity - 0.72).abs() < 1e-9);
        assert!(results.iter().all(|r| r.source == MatchSource::TransitiveSynonym));
        assert!(results.iter().all(|r| r.matched_term.starts_with("mi (via ")));
    }

    #[test]
    fn test_results_sorted_and_unique() {
        let store = store();
        let synonyms = SynonymIndex::from_value(json!({
            "410": {"synonyms": ["Myocardial infarction", "MI"]},
            "410.7": {"aliases": ["Subendocardial myocardial infarction"]}
        }));
        let results = SimilarityMatcher::new(&store, &synonyms).search("myocardial infarction", 0.1, 10);

        let mut codes: Vec<&str> = results.iter().map(|r| r.code.as_str()).collect();
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn test_max_results_truncates() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let results = SimilarityMatcher::new(&store, &synonyms).search("failure", 0.0, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_keyword_search() {
        let store = store();
        let synonyms = SynonymIndex::new();
        let matcher = SimilarityMatcher::new(&store, &synonyms);

        let by_code: Vec<&str> = matcher.keyword_search("410", 10).iter().map(|n| n.code.as_str()).collect();
        assert_eq!(by_code, vec!["410", "410.7"]);

        let by_name = matcher.keyword_search("HEART", 1);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].code, "428");
        assert!(matcher.keyword_search("  ", 10).is_empty());
    }
}
