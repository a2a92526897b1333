//! Graph visualization of a prediction
//!
//! Merges the neighborhoods and ancestor paths of the top candidates
//! into one node/edge set, plus one node per recognized case entity.

use crate::hierarchy::HierarchyStore;
use crate::paths::{GraphEdge, GraphNode, PathEntry, PathResolver};
use crate::predictor::Candidate;
use crate::preprocess::Entities;
use serde::Serialize;
use std::collections::HashSet;

/// Candidates drawn per visualization
pub const TOP_CANDIDATES: usize = 3;
/// Neighborhood depth around each drawn candidate
pub const VISUAL_DEPTH: u32 = 2;
const ENTITIES_PER_KIND: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePath {
    pub code: String,
    pub name: String,
    pub probability: f64,
    pub hierarchy_path: Vec<PathEntry>,
    pub related_nodes: Vec<GraphNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Visualization {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub paths: Vec<CandidatePath>,
    pub entities: Entities,
}

pub fn visualize(store: &HierarchyStore, candidates: &[Candidate], entities: &Entities) -> Visualization {
    let resolver = PathResolver::new(store);
    let mut view = Visualization {
        entities: entities.clone(),
        ..Default::default()
    };
    let mut node_ids: HashSet<String> = HashSet::new();
    let mut edge_keys: HashSet<(String, String)> = HashSet::new();

    for candidate in candidates
        .iter()
        .filter(|c| !c.code.trim().is_empty())
        .take(TOP_CANDIDATES)
    {
        let hood = resolver
            .neighborhood(&candidate.code, VISUAL_DEPTH)
            .unwrap_or_default();

        for node in &hood.nodes {
            if node_ids.insert(node.id.clone()) {
                view.nodes.push(node.clone());
            }
        }
        for edge in &hood.edges {
            if edge_keys.insert((edge.source.clone(), edge.target.clone())) {
                view.edges.push(edge.clone());
            }
        }

        view.paths.push(CandidatePath {
            code: candidate.code.clone(),
            name: candidate.name.clone(),
            probability: candidate.probability,
            hierarchy_path: resolver.ancestor_path(&candidate.code),
            related_nodes: hood.nodes,
        });
    }

    for (kind, list) in entities.groups() {
        for entity in list.iter().take(ENTITIES_PER_KIND) {
            let id = format!("entity_{}_{}", kind, entity);
            if node_ids.insert(id.clone()) {
                view.nodes.push(GraphNode {
                    id,
                    label: entity.clone(),
                    level: 0,
                    kind: kind.to_string(),
                    probability: 0.0,
                });
            }
        }
    }

    view
}
