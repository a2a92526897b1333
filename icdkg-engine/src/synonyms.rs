//! Synonym Index
//!
//! Code → alias terms, read from a mapping of code to
//! `{synonyms, aliases, concept_names}` lists. Reverse lookup
//! (term → codes) is a linear scan; ranking is left to the matcher.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// Alias lists for one code, as they appear in the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynonymEntry {
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub concept_names: Vec<String>,
}

impl SynonymEntry {
    /// All terms: synonyms, then aliases, then concept names
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.synonyms
            .iter()
            .chain(&self.aliases)
            .chain(&self.concept_names)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SynonymIndex {
    entries: BTreeMap<String, SynonymEntry>,
}

impl SynonymIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed document; entries that are not alias objects are skipped
    pub fn from_value(value: serde_json::Value) -> Self {
        let serde_json::Value::Object(map) = value else {
            warn!("Synonym source is not an object; using empty index");
            return Self::default();
        };

        let mut entries = BTreeMap::new();
        for (code, entry) in map {
            match serde_json::from_value::<SynonymEntry>(entry) {
                Ok(entry) => {
                    entries.insert(code, entry);
                }
                Err(e) => warn!("Skipping malformed synonym entry {}: {}", code, e),
            }
        }
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let index = Self::from_value(value);
        info!("Loaded {} synonym entries from {}", index.len(), path.display());
        Ok(index)
    }

    /// Load from `path`, or an empty index when it cannot be read
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(index) => index,
            Err(e) => {
                warn!("Synonym source {} unavailable ({}); using empty index", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, code: impl Into<String>, entry: SynonymEntry) {
        self.entries.insert(code.into(), entry);
    }

    /// All terms registered for `code`
    pub fn terms_for(&self, code: &str) -> BTreeSet<String> {
        self.entries
            .get(code)
            .map(|entry| entry.terms().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Codes with an alias containing `term` (case-insensitive)
    pub fn candidates_for(&self, term: &str) -> BTreeSet<String> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|(_, entry)| entry.terms().any(|t| t.to_lowercase().contains(&needle)))
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Entries in code order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SynonymEntry)> {
        self.entries.iter().map(|(code, entry)| (code.as_str(), entry))
    }

    pub fn get(&self, code: &str) -> Option<&SynonymEntry> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
