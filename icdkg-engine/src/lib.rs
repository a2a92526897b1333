//! # icdkg Engine
//!
//! Code-Hierarchy Knowledge Engine:
//! - Taxonomy store with tolerant loading and copy-on-reload handle
//! - Synonym index and similarity matching
//! - Ancestor paths and code neighborhoods
//! - Explanation synthesis (structure + salience + optional narrative)
//! - Weighted fusion of candidate rankings
//!
//! Plus the pieces the HTTP surface feeds into it: text preprocessing,
//! a predictor capability with a fixed mock, prediction snapshots and
//! graph visualization.
//!
//! Everything here is synchronous over in-memory state, except the
//! narrative call made while explaining.

pub mod explain;
pub mod fusion;
pub mod hierarchy;
pub mod matcher;
pub mod paths;
pub mod predictor;
pub mod preprocess;
pub mod snapshot;
pub mod synonyms;
pub mod visualize;

pub use explain::{Explanation, ExplanationSynthesizer, NarrativeGenerator};
pub use fusion::{fuse, FusionCandidate};
pub use hierarchy::{CodeNode, HierarchyStore, StoreHandle};
pub use matcher::{MatchResult, MatchSource, SimilarityMatcher};
pub use paths::{Neighborhood, PathEntry, PathResolver};
pub use predictor::{Candidate, MockPredictor, Predictor};
pub use preprocess::{CaseContext, Preprocessor};
pub use synonyms::SynonymIndex;
