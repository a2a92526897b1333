//! Narrative generator capability
//!
//! Free-text explanations come from an external text generator. The
//! concrete generator is chosen once at startup; [`NoNarrative`] is the
//! strategy used when none is configured.

use crate::hierarchy::CodeNode;
use crate::paths::PathEntry;
use crate::preprocess::CaseContext;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("Narrative generator unavailable")]
    Unavailable,

    #[error("Narrative request failed: {0}")]
    Request(String),

    #[error("Unexpected narrative response: {0}")]
    Response(String),
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Short identifier for logs and health output
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, NarrativeError>;
}

/// Generator that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNarrative;

#[async_trait]
impl NarrativeGenerator for NoNarrative {
    fn name(&self) -> &str {
        "none"
    }

    async fn generate(&self, _prompt: &str, _system_prompt: &str) -> Result<String, NarrativeError> {
        Err(NarrativeError::Unavailable)
    }
}

pub const SYSTEM_PROMPT: &str = "You are a medical coding expert. Explain in plain language \
why a clinical case is assigned a given ICD code.";

/// Prompt asking the generator to explain `node` for this case
pub fn build_prompt(
    context: &CaseContext,
    node: &CodeNode,
    path: &[PathEntry],
    keywords: &[String],
) -> String {
    let path_names: Vec<&str> = path.iter().map(|e| e.name.as_str()).collect();
    let mut prompt = format!(
        "Explain the relationship between the following case and ICD code.\n\n\
         Case description:\n{}\n\n\
         ICD code: {}\n\
         ICD name: {}\n\
         Hierarchy: {}\n",
        context.original_text,
        node.code,
        if node.name.is_empty() { "unknown" } else { &node.name },
        path_names.join(" → "),
    );
    if !keywords.is_empty() {
        prompt.push_str(&format!("Key terms: {}\n", keywords.join(", ")));
    }
    for (kind, entities) in context.entities.groups() {
        if !entities.is_empty() {
            prompt.push_str(&format!("Case {}: {}\n", kind, entities.join(", ")));
        }
    }
    prompt.push_str(
        "\nPlease cover:\n\
         1. What the code means\n\
         2. Which findings in the case support it\n\
         3. Its clinical significance",
    );
    prompt
}
