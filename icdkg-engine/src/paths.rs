//! Path Resolver
//!
//! Ancestor chains, local neighborhoods and structural filtering over a
//! [`HierarchyStore`] snapshot.

use crate::hierarchy::{CodeNode, HierarchyStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Edge weight used when neither endpoint carries a salience score
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.5;

/// One step of an ancestor chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathEntry {
    pub code: String,
    pub name: String,
    pub level: u32,
}

impl From<&CodeNode> for PathEntry {
    fn from(node: &CodeNode) -> Self {
        Self {
            code: node.code.clone(),
            name: node.name.clone(),
            level: node.level,
        }
    }
}

/// Node of a neighborhood graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub level: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub probability: f64,
}

impl From<&CodeNode> for GraphNode {
    fn from(node: &CodeNode) -> Self {
        Self {
            id: node.code.clone(),
            label: if node.name.is_empty() {
                node.code.clone()
            } else {
                node.name.clone()
            },
            level: node.level,
            kind: "icd".to_string(),
            probability: node.salience,
        }
    }
}

/// Parent → child edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Neighborhood {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Optional structural constraints for [`PathResolver::filter_by_constraints`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub max_level: Option<u32>,
    /// Code that must appear on the candidate's ancestor path
    #[serde(default, alias = "parent_code")]
    pub ancestor: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.min_level.is_none() && self.max_level.is_none() && self.ancestor.is_none()
    }
}

/// Anything that names a code
pub trait CodeRef {
    fn code_ref(&self) -> &str;
}

impl CodeRef for String {
    fn code_ref(&self) -> &str {
        self
    }
}

impl CodeRef for &str {
    fn code_ref(&self) -> &str {
        self
    }
}

/// Weight of the edge between two nodes
pub fn edge_weight(a: &CodeNode, b: &CodeNode) -> f64 {
    let weight = a.salience.max(b.salience);
    if weight > 0.0 {
        weight
    } else {
        DEFAULT_EDGE_WEIGHT
    }
}

pub struct PathResolver<'a> {
    store: &'a HierarchyStore,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a HierarchyStore) -> Self {
        Self { store }
    }

    /// Root-first chain ending at the resolved node
    ///
    /// Empty when `code` does not resolve. A parent cycle stops the walk
    /// and returns what was collected up to the revisit.
    pub fn ancestor_path(&self, code: &str) -> Vec<PathEntry> {
        let Some(start) = self.store.lookup(code) else {
            return Vec::new();
        };

        let mut path = VecDeque::new();
        let mut visited = HashSet::new();
        let mut current = Some(start);

        while let Some(node) = current {
            if !visited.insert(node.code.as_str()) {
                warn!("Parent cycle detected at {} while resolving {}", node.code, code);
                break;
            }
            path.push_front(PathEntry::from(node));
            current = node.parent.as_deref().and_then(|p| self.store.get(p));
        }

        path.into()
    }

    /// Nodes within `depth` parent/child hops of the resolved node
    ///
    /// Depth 0 is the node alone, 1 its parent and children, and so on.
    /// Nodes are listed in discovery order with the queried node first.
    /// Returns `None` when `code` does not resolve.
    pub fn neighborhood(&self, code: &str, depth: u32) -> Option<Neighborhood> {
        let start = self.store.lookup(code)?;

        let mut result = Neighborhood::default();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut linked: HashSet<(&str, &str)> = HashSet::new();
        let mut queue: VecDeque<(&CodeNode, u32)> = VecDeque::new();

        seen.insert(&start.code);
        result.nodes.push(GraphNode::from(start));
        queue.push_back((start, 0));

        while let Some((node, distance)) = queue.pop_front() {
            if distance >= depth {
                continue;
            }

            let parent = node.parent.as_deref().and_then(|p| self.store.get(p));
            let children = node.children.iter().filter_map(|c| self.store.get(c));

            for (upper, lower, neighbor) in parent
                .map(|p| (p, node, p))
                .into_iter()
                .chain(children.map(|c| (node, c, c)))
            {
                if linked.insert((upper.code.as_str(), lower.code.as_str())) {
                    result.edges.push(GraphEdge {
                        source: upper.code.clone(),
                        target: lower.code.clone(),
                        kind: "parent-child".to_string(),
                        weight: edge_weight(upper, lower),
                    });
                }
                if seen.insert(&neighbor.code) {
                    result.nodes.push(GraphNode::from(neighbor));
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }

        debug!(
            code = %start.code,
            depth,
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            "Neighborhood resolved"
        );
        Some(result)
    }

    /// Keep candidates whose node satisfies every given constraint
    ///
    /// Candidates that do not resolve are dropped.
    pub fn filter_by_constraints<T: CodeRef>(
        &self,
        candidates: Vec<T>,
        constraints: &Constraints,
    ) -> Vec<T> {
        candidates
            .into_iter()
            .filter(|candidate| {
                let Some(node) = self.store.lookup(candidate.code_ref()) else {
                    return false;
                };
                if constraints.min_level.is_some_and(|min| node.level < min) {
                    return false;
                }
                if constraints.max_level.is_some_and(|max| node.level > max) {
                    return false;
                }
                match &constraints.ancestor {
                    Some(ancestor) => self
                        .ancestor_path(&node.code)
                        .iter()
                        .any(|entry| &entry.code == ancestor),
                    None => true,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> HierarchyStore {
        HierarchyStore::from_value(json!({
            "410": {"name": "Acute myocardial infarction", "level": 1, "parent": null, "children": ["410.7", "410.9"]},
            "410.7": {"name": "Subendocardial infarction", "level": 2, "parent": "410", "children": ["410.71"]},
            "410.71": {"name": "Subendocardial infarction, initial episode", "level": 3, "parent": "410.7", "children": [], "probability": 0.89},
            "410.9": {"name": "Unspecified site", "level": 2, "parent": "410", "children": []}
        }))
        .unwrap()
    }

    #[test]
    fn test_ancestor_path_root_first() {
        let store = store();
        let path = PathResolver::new(&store).ancestor_path("410.71");
        let codes: Vec<&str> = path.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["410", "410.7", "410.71"]);
        assert!(path.windows(2).all(|w| w[1].level == w[0].level + 1));
    }

    #[test]
    fn test_ancestor_path_unknown_code_is_empty() {
        let store = store();
        assert!(PathResolver::new(&store).ancestor_path("999").is_empty());
    }

    #[test]
    fn test_ancestor_path_stops_on_cycle() {
        // Two nodes naming each other as parent
        let store = HierarchyStore::from_value(json!({
            "500": {"name": "A", "parent": "500.1", "children": []},
            "500.1": {"name": "B", "parent": "500", "children": []}
        }))
        .unwrap();
        let path = PathResolver::new(&store).ancestor_path("500.1");
        assert_eq!(path.len(), 2);
        assert_eq!(path.last().unwrap().code, "500.1");
    }

    #[test]
    fn test_neighborhood_immediate_family() {
        let store = store();
        let hood = PathResolver::new(&store).neighborhood("410.7", 1).unwrap();

        assert_eq!(hood.nodes[0].id, "410.7");
        assert_eq!(hood.nodes.len(), 3);
        assert_eq!(hood.edges.len(), 2);
        assert!(hood.edges.iter().any(|e| e.source == "410" && e.target == "410.7"));
        assert!(hood.edges.iter().any(|e| e.source == "410.7" && e.target == "410.71"));
    }

    #[test]
    fn test_neighborhood_depth_zero_and_two() {
        let store = store();
        let resolver = PathResolver::new(&store);

        let alone = resolver.neighborhood("410.7", 0).unwrap();
        assert_eq!(alone.nodes.len(), 1);
        assert!(alone.edges.is_empty());

        // Two hops from 410.7 reaches the sibling 410.9 through 410
        let wide = resolver.neighborhood("410.7", 2).unwrap();
        assert_eq!(wide.nodes.len(), 4);
        assert_eq!(wide.edges.len(), 3);
    }

    #[test]
    fn test_edge_weight_floor() {
        let store = store();
        let hood = PathResolver::new(&store).neighborhood("410.7", 1).unwrap();
        let to_parent = hood.edges.iter().find(|e| e.source == "410").unwrap();
        let to_child = hood.edges.iter().find(|e| e.target == "410.71").unwrap();
        assert_eq!(to_parent.weight, DEFAULT_EDGE_WEIGHT);
        assert_eq!(to_child.weight, 0.89);
    }

    #[test]
    fn test_neighborhood_unknown_code() {
        let store = store();
        assert!(PathResolver::new(&store).neighborhood("999", 1).is_none());
    }

    #[test]
    fn test_filter_by_constraints() {
        let store = store();
        let resolver = PathResolver::new(&store);
        let candidates = vec!["410", "410.7", "410.71", "999"];

        let deep = resolver.filter_by_constraints(
            candidates.clone(),
            &Constraints {
                min_level: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(deep, vec!["410.7", "410.71"]);

        let under = resolver.filter_by_constraints(
            candidates,
            &Constraints {
                ancestor: Some("410.7".to_string()),
                max_level: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(under, vec!["410.7", "410.71"]);
    }
}
