//! Hierarchy Store
//!
//! In-memory taxonomy of segmented diagnostic codes (`410` → `410.7`
//! → `410.71`). A store is built once from a source document and is never
//! mutated afterwards; a reload builds a whole new store (see [`StoreHandle`]).
//!
//! # Tolerant load
//! Source data may be partially curated, so consistency problems never
//! reject the load. The offending node is kept, marked `consistent = false`,
//! repaired where the repair is unambiguous, and the problem is recorded
//! in [`HierarchyStore::issues`]:
//! - level ≠ segment depth → level normalized to segment depth
//! - parent missing from the store → parent cleared
//! - parent not a strict segment prefix → link kept, node flagged
//! - child missing from the store → child entry dropped
//! - child whose parent is someone else → child entry dropped
//! - field of the wrong type → field defaulted

mod defaults;
mod handle;
mod source;

pub use handle::StoreHandle;
pub use source::SnapshotMetadata;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors reading a taxonomy source
///
/// Only surfaced by the strict loaders; [`HierarchyStore::load_or_default`]
/// absorbs all of them.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Taxonomy source not found: {0}")]
    Missing(PathBuf),

    #[error("Failed to read taxonomy source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Taxonomy source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Taxonomy source must be a JSON object keyed by code")]
    NotAnObject,
}

/// One code in the taxonomy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeNode {
    /// Dot-segmented identifier, e.g. `410.71`
    pub code: String,
    pub name: String,
    /// Segment depth of `code` (root codes are level 1)
    pub level: u32,
    pub parent: Option<String>,
    /// Ordered, duplicate-free child codes
    pub children: Vec<String>,
    /// Externally supplied relevance score in [0, 1]
    pub salience: f64,
    /// False if any consistency issue was recorded against this node
    pub consistent: bool,
}

impl CodeNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Consistency problem found at load time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyIssue {
    pub code: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    LevelMismatch { declared: i64, expected: u32 },
    DanglingParent { parent: String },
    ParentNotPrefix { parent: String },
    DanglingChild { child: String },
    ChildParentMismatch { child: String, child_parent: Option<String> },
    MalformedField { field: String },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::LevelMismatch { declared, expected } => write!(
                f,
                "{}: declared level {} but code has {} segment(s)",
                self.code, declared, expected
            ),
            IssueKind::DanglingParent { parent } => {
                write!(f, "{}: parent {} does not exist", self.code, parent)
            }
            IssueKind::ParentNotPrefix { parent } => write!(
                f,
                "{}: parent {} is not a segment prefix of the code",
                self.code, parent
            ),
            IssueKind::DanglingChild { child } => {
                write!(f, "{}: child {} does not exist", self.code, child)
            }
            IssueKind::ChildParentMismatch { child, child_parent } => write!(
                f,
                "{}: child {} names {} as its parent",
                self.code,
                child,
                child_parent.as_deref().unwrap_or("no node")
            ),
            IssueKind::MalformedField { field } => {
                write!(f, "{}: field {} has the wrong type", self.code, field)
            }
        }
    }
}

/// Hierarchy segments of a code
///
/// The category (text before the first `.`) is one segment and every
/// character of the subdivision after it is another, so `410.71` is
/// `["410", "7", "1"]`.
pub fn segments(code: &str) -> Vec<&str> {
    let (category, subdivision) = match code.split_once('.') {
        Some((category, rest)) => (category, rest),
        None => (code, ""),
    };
    let mut out = vec![category];
    out.extend(
        subdivision
            .char_indices()
            .filter(|(_, c)| *c != '.')
            .map(|(i, c)| &subdivision[i..i + c.len_utf8()]),
    );
    out
}

/// Number of hierarchy segments in a code
pub fn segment_depth(code: &str) -> u32 {
    segments(code).len() as u32
}

/// True if `ancestor`'s segments are a strict prefix of `code`'s segments
pub fn is_segment_prefix(ancestor: &str, code: &str) -> bool {
    let a = segments(ancestor);
    let c = segments(code);
    a.len() < c.len() && c.starts_with(&a)
}

fn strip_dots(code: &str) -> String {
    code.chars().filter(|c| *c != '.').collect()
}

/// Immutable taxonomy snapshot
#[derive(Debug, Clone, Default)]
pub struct HierarchyStore {
    nodes: BTreeMap<String, CodeNode>,
    issues: Vec<ConsistencyIssue>,
    snapshot: Option<SnapshotMetadata>,
}

impl HierarchyStore {
    /// Read and build a store from a taxonomy file (strict on I/O and JSON)
    pub fn load(path: &Path) -> Result<Self, HierarchyError> {
        if !path.exists() {
            return Err(HierarchyError::Missing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| HierarchyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json_str(&content)?;
        info!(
            "Loaded taxonomy from {}: {} codes, {} consistency issue(s)",
            path.display(),
            store.len(),
            store.issues.len()
        );
        Ok(store)
    }

    /// Load from `path`, falling back to the built-in taxonomy on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{}; using built-in default taxonomy", e);
                Self::builtin()
            }
        }
    }

    /// Small built-in taxonomy used when no source is available
    pub fn builtin() -> Self {
        match Self::from_value(defaults::default_taxonomy()) {
            Ok(store) => store,
            // The built-in document is always an object
            Err(_) => Self::default(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, HierarchyError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, HierarchyError> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// Build from a parsed source document (plain hierarchy or snapshot envelope)
    pub fn from_value(value: serde_json::Value) -> Result<Self, HierarchyError> {
        let parsed = source::parse_document(value)?;
        let mut store = Self::build(parsed.records);
        store.snapshot = parsed.snapshot;
        Ok(store)
    }

    fn build(records: Vec<source::NodeRecord>) -> Self {
        let mut issues = Vec::new();
        let mut nodes: BTreeMap<String, CodeNode> = BTreeMap::new();

        for record in records {
            let expected = segment_depth(&record.code);
            let mut consistent = true;
            for field in &record.malformed {
                issues.push(ConsistencyIssue {
                    code: record.code.clone(),
                    kind: IssueKind::MalformedField {
                        field: field.to_string(),
                    },
                });
                consistent = false;
            }
            if let Some(declared) = record.level {
                if declared != i64::from(expected) {
                    issues.push(ConsistencyIssue {
                        code: record.code.clone(),
                        kind: IssueKind::LevelMismatch { declared, expected },
                    });
                    consistent = false;
                }
            }

            let mut seen = HashSet::new();
            let children = record
                .children
                .into_iter()
                .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                .collect();

            nodes.insert(
                record.code.clone(),
                CodeNode {
                    name: record.name.unwrap_or_default(),
                    level: expected,
                    parent: record.parent.filter(|p| !p.is_empty()),
                    children,
                    salience: record.probability,
                    consistent,
                    code: record.code,
                },
            );
        }

        // Parent links
        let codes: HashSet<String> = nodes.keys().cloned().collect();
        for node in nodes.values_mut() {
            let Some(parent) = node.parent.clone() else {
                continue;
            };
            if !codes.contains(&parent) {
                issues.push(ConsistencyIssue {
                    code: node.code.clone(),
                    kind: IssueKind::DanglingParent { parent },
                });
                node.parent = None;
                node.consistent = false;
            } else if !is_segment_prefix(&parent, &node.code) {
                issues.push(ConsistencyIssue {
                    code: node.code.clone(),
                    kind: IssueKind::ParentNotPrefix { parent },
                });
                node.consistent = false;
            }
        }

        // Child links, checked against the repaired parent links
        let parents: HashMap<String, Option<String>> = nodes
            .values()
            .map(|n| (n.code.clone(), n.parent.clone()))
            .collect();
        for node in nodes.values_mut() {
            let mut kept = Vec::with_capacity(node.children.len());
            for child in std::mem::take(&mut node.children) {
                match parents.get(&child) {
                    None => {
                        issues.push(ConsistencyIssue {
                            code: node.code.clone(),
                            kind: IssueKind::DanglingChild { child },
                        });
                        node.consistent = false;
                    }
                    Some(child_parent) if child_parent.as_deref() != Some(node.code.as_str()) => {
                        issues.push(ConsistencyIssue {
                            code: node.code.clone(),
                            kind: IssueKind::ChildParentMismatch {
                                child,
                                child_parent: child_parent.clone(),
                            },
                        });
                        node.consistent = false;
                    }
                    Some(_) => kept.push(child),
                }
            }
            node.children = kept;
        }

        for issue in &issues {
            warn!("Inconsistent taxonomy entry: {}", issue);
        }
        debug!(codes = nodes.len(), issues = issues.len(), "Taxonomy built");

        Self {
            nodes,
            issues,
            snapshot: None,
        }
    }

    /// Exact-code access
    pub fn get(&self, code: &str) -> Option<&CodeNode> {
        self.nodes.get(code)
    }

    /// Resolve a code as typed by a user
    ///
    /// Fallback ladder, first hit wins:
    /// 1. exact match
    /// 2. match with all `.` removed from both sides (`41071` → `410.71`)
    /// 3. prefix match in either direction, in code order
    ///
    /// Returns `None` when nothing matches.
    pub fn lookup(&self, code: &str) -> Option<&CodeNode> {
        let query = code.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(node) = self.nodes.get(query) {
            return Some(node);
        }

        let stripped = strip_dots(query);
        if let Some(node) = self
            .nodes
            .values()
            .find(|n| strip_dots(&n.code) == stripped)
        {
            debug!(query, resolved = %node.code, "Resolved code ignoring separators");
            return Some(node);
        }

        let found = self
            .nodes
            .values()
            .find(|n| n.code.starts_with(query) || query.starts_with(n.code.as_str()));
        if let Some(node) = found {
            debug!(query, resolved = %node.code, "Resolved code by prefix");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in code order
    pub fn iter(&self) -> impl Iterator<Item = &CodeNode> {
        self.nodes.values()
    }

    pub fn issues(&self) -> &[ConsistencyIssue] {
        &self.issues
    }

    /// Envelope metadata when the source was a prediction snapshot
    pub fn snapshot_metadata(&self) -> Option<&SnapshotMetadata> {
        self.snapshot.as_ref()
    }
}
