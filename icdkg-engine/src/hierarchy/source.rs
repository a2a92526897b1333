//! Taxonomy source documents
//!
//! Two shapes are accepted:
//! - a plain object keyed by code, each value `{name, level, parent, children, probability?}`
//! - a prediction snapshot envelope carrying `predictions` plus metadata,
//!   with the taxonomy inline under `icd_hierarchy`

use super::HierarchyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Metadata carried by a prediction snapshot envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Raw prediction payload as written by the predictor
    #[serde(default)]
    pub predictions: Value,
}

fn default_top_k() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.5
}

/// Source entry after per-field validation, keyed by its map key
#[derive(Debug)]
pub(super) struct NodeRecord {
    pub code: String,
    pub name: Option<String>,
    pub level: Option<i64>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub probability: f64,
    /// Fields present with an unusable type; their values were dropped
    pub malformed: Vec<&'static str>,
}

pub(super) struct ParsedDocument {
    pub records: Vec<NodeRecord>,
    pub snapshot: Option<SnapshotMetadata>,
}

pub(super) fn parse_document(value: Value) -> Result<ParsedDocument, HierarchyError> {
    let Value::Object(mut root) = value else {
        return Err(HierarchyError::NotAnObject);
    };

    if root.contains_key("predictions") {
        let hierarchy = root.remove("icd_hierarchy").unwrap_or(Value::Null);
        let snapshot = match serde_json::from_value::<SnapshotMetadata>(Value::Object(root)) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Malformed snapshot metadata ({}); keeping taxonomy only", e);
                SnapshotMetadata {
                    timestamp: String::new(),
                    original_text: String::new(),
                    model: String::new(),
                    top_k: default_top_k(),
                    threshold: default_threshold(),
                    predictions: Value::Null,
                }
            }
        };
        info!(
            "Taxonomy source is a prediction snapshot (timestamp: {})",
            if snapshot.timestamp.is_empty() { "N/A" } else { &snapshot.timestamp }
        );

        let records = match hierarchy {
            Value::Object(map) => records_from_map(map),
            Value::Null => Vec::new(),
            _ => {
                warn!("Snapshot icd_hierarchy is not an object; treating as empty");
                Vec::new()
            }
        };
        return Ok(ParsedDocument {
            records,
            snapshot: Some(snapshot),
        });
    }

    Ok(ParsedDocument {
        records: records_from_map(root),
        snapshot: None,
    })
}

fn records_from_map(map: serde_json::Map<String, Value>) -> Vec<NodeRecord> {
    let mut records = Vec::with_capacity(map.len());
    for (code, value) in map {
        let code = code.trim().to_string();
        if code.is_empty() {
            warn!("Skipping taxonomy entry with empty code");
            continue;
        }
        let Value::Object(fields) = value else {
            warn!("Skipping taxonomy entry {}: not an object", code);
            continue;
        };
        records.push(record_from_fields(code, &fields));
    }
    records
}

/// Read one entry field by field
///
/// A missing or null field takes its default. A field of the wrong type
/// also takes its default and is listed in `malformed`.
fn record_from_fields(code: String, fields: &serde_json::Map<String, Value>) -> NodeRecord {
    let mut malformed = Vec::new();

    let name = match fields.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => {
            malformed.push("name");
            None
        }
    };

    let level = match fields.get("level") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let level = value.as_i64().or_else(|| {
                value
                    .as_f64()
                    .filter(|l| l.is_finite() && l.fract() == 0.0)
                    .map(|l| l as i64)
            });
            if level.is_none() {
                malformed.push("level");
            }
            level
        }
    };

    let parent = match fields.get("parent") {
        None | Some(Value::Null) => None,
        Some(Value::String(parent)) => Some(parent.trim().to_string()),
        Some(_) => {
            malformed.push("parent");
            None
        }
    };

    let children = match fields.get("children") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let children: Vec<String> = items
                .iter()
                .filter_map(|c| c.as_str().map(|c| c.trim().to_string()))
                .collect();
            if children.len() != items.len() {
                malformed.push("children");
            }
            children
        }
        Some(_) => {
            malformed.push("children");
            Vec::new()
        }
    };

    let probability = match fields.get("probability") {
        None | Some(Value::Null) => 0.0,
        Some(value) => match value.as_f64().filter(|p| p.is_finite()) {
            Some(p) => p.clamp(0.0, 1.0),
            None => {
                malformed.push("probability");
                0.0
            }
        },
    };

    NodeRecord {
        code,
        name,
        level,
        parent,
        children,
        probability,
        malformed,
    }
}
