//! End-to-end behavior of the knowledge engine
//!
//! Exercises the public API the way the server composes it: one store
//! snapshot shared by resolver, matcher and synthesizer.

use icdkg_engine::hierarchy::HierarchyStore;
use icdkg_engine::matcher::MatchSource;
use icdkg_engine::predictor::{PredictParams, Predictor};
use icdkg_engine::snapshot::PredictionSnapshot;
use icdkg_engine::{
    fuse, Candidate, ExplanationSynthesizer, MockPredictor, PathResolver, Preprocessor,
    SimilarityMatcher, StoreHandle, SynonymIndex,
};
use serde_json::json;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

fn three_level() -> HierarchyStore {
    HierarchyStore::from_value(json!({
        "410": {"name": "Acute myocardial infarction", "level": 1, "parent": null, "children": ["410.7"]},
        "410.7": {"name": "Subendocardial infarction", "level": 2, "parent": "410", "children": ["410.71"]},
        "410.71": {"name": "Subendocardial infarction, initial episode of care", "level": 3, "parent": "410.7", "children": []}
    }))
    .unwrap()
}

#[test]
fn test_ancestor_paths_are_rooted_and_step_by_one() {
    let store = HierarchyStore::builtin();
    let resolver = PathResolver::new(&store);

    for node in store.iter() {
        let path = resolver.ancestor_path(&node.code);
        let first = store.get(&path[0].code).unwrap();
        assert!(first.is_root(), "{} path starts at non-root", node.code);
        assert_eq!(path.last().unwrap().code, node.code);
        assert!(
            path.windows(2).all(|w| w[1].level == w[0].level + 1),
            "levels along {} path are not consecutive",
            node.code
        );
    }
}

#[test]
fn test_lookup_is_idempotent() {
    let store = HierarchyStore::builtin();
    for query in ["410.71", "41071", "4107", "428", "414.019", "427.3"] {
        let first = store.lookup(query).unwrap();
        assert_eq!(store.lookup(&first.code), Some(first), "query {}", query);
    }
}

#[test]
fn test_heart_attack_reaches_myocardial_infarction_transitively() {
    let store = HierarchyStore::builtin();
    let synonyms = SynonymIndex::from_value(json!({
        "410": {"concept_names": ["Myocardial infarction"]}
    }));
    let results = SimilarityMatcher::new(&store, &synonyms).search("heart attack", 0.7, 10);

    let hit = results.iter().find(|r| r.code == "410").unwrap();
    assert_eq!(hit.source, MatchSource::TransitiveSynonym);
    assert!((hit.similarity - 0.81).abs() < 1e-9);
    assert!(hit.matched_term.starts_with("heart attack (via "));
}

#[test]
fn test_search_results_sorted_and_unique() {
    let store = HierarchyStore::builtin();
    let synonyms = SynonymIndex::from_value(json!({
        "410": {"synonyms": ["Heart attack", "MI"]},
        "410.71": {"aliases": ["NSTEMI", "heart attack, subendocardial"]},
        "428.0": {"aliases": ["CHF"]}
    }));
    let matcher = SimilarityMatcher::new(&store, &synonyms);

    for concept in ["heart attack", "myocardial infarction", "heart", "mi", "failure"] {
        let results = matcher.search(concept, 0.3, 20);
        assert!(
            results.windows(2).all(|w| w[0].similarity >= w[1].similarity),
            "{} results not sorted",
            concept
        );
        let codes: HashSet<&str> = results.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes.len(), results.len(), "{} results not unique", concept);
    }
}

#[test]
fn test_fuse_example() {
    let rankings = vec![
        vec![Candidate::new("A", "", 0.8)],
        vec![Candidate::new("A", "", 0.6), Candidate::new("B", "", 0.5)],
    ];
    let fused = fuse(&rankings, Some(&[0.5, 0.5][..])).unwrap();

    assert_eq!(fused[0].code, "A");
    assert!((fused[0].probability - 0.7).abs() < 1e-9);
    assert_eq!(fused[1].code, "B");
    assert!((fused[1].probability - 0.25).abs() < 1e-9);
}

#[test]
fn test_neighborhood_of_middle_node() {
    let store = three_level();
    let hood = PathResolver::new(&store).neighborhood("410.7", 1).unwrap();

    let to_parent: Vec<_> = hood.edges.iter().filter(|e| e.target == "410.7").collect();
    let to_child: Vec<_> = hood.edges.iter().filter(|e| e.source == "410.7").collect();
    assert_eq!(to_parent.len(), 1);
    assert_eq!(to_parent[0].source, "410");
    assert_eq!(to_child.len(), 1);
    assert_eq!(to_child[0].target, "410.71");
}

#[test]
fn test_reload_never_exposes_dangling_parents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"{
            "410": {"name": "AMI", "parent": null, "children": ["410.7"]},
            "410.7": {"name": "Subendocardial", "parent": "410", "children": []},
            "427.31": {"name": "Atrial fibrillation", "parent": "427.3", "children": []},
            "428.0": {"name": "CHF", "parent": "428", "children": []}
        }"#,
    )
    .unwrap();
    file.flush().unwrap();

    let handle = StoreHandle::open(file.path());
    let store = handle.reload().unwrap();
    for node in store.iter() {
        if let Some(parent) = &node.parent {
            assert!(store.lookup(parent).is_some(), "{} has dangling parent {}", node.code, parent);
        }
    }
    assert!(!store.issues().is_empty());
}

#[test]
fn test_concurrent_readers_see_whole_stores() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let small = r#"{"410": {"name": "AMI", "parent": null, "children": []}}"#;
    file.write_all(small.as_bytes()).unwrap();
    file.flush().unwrap();

    let handle = Arc::new(StoreHandle::open(file.path()));
    let builtin_len = HierarchyStore::builtin().len();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let store = handle.snapshot();
                    // Either the file store (1 code) or the built-in one, never a mix
                    let len = store.len();
                    assert!(len == 1 || len == builtin_len);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        handle.replace(HierarchyStore::builtin());
        handle.reload().unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
}

#[tokio::test]
async fn test_predict_snapshot_explain_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("icd_hierarchy.json");

    let text = "Crushing chest pain, history of MI, on aspirin";
    let context = Preprocessor::default().preprocess(text);
    let prediction = MockPredictor::default().predict(&context.preprocessed_text(), &PredictParams::default());
    let builtin = HierarchyStore::builtin();
    PredictionSnapshot::from_candidates(text, &prediction, 10, 0.5, Some(&builtin))
        .write_to(&snapshot_path)
        .unwrap();

    let handle = StoreHandle::open(&snapshot_path);
    let store = handle.snapshot();
    assert_eq!(store.snapshot_metadata().unwrap().original_text, text);

    let synonyms = SynonymIndex::new();
    let synthesizer = ExplanationSynthesizer::structural();
    for candidate in &prediction.candidates {
        let explanation = synthesizer
            .explain(&store, &synonyms, &candidate.code, &context, candidate.probability)
            .await
            .unwrap();
        assert_eq!(explanation.code, candidate.code);
        assert!(explanation.narrative.is_none());
        assert!(!explanation.hierarchy_path.is_empty());
    }
}
