//! HTTP API handlers
//!
//! Graph routes live under `/api/graph`; explanation, prediction, fusion
//! and case lookups each have their own prefix.

pub mod cases;
pub mod explain;
pub mod fusion;
pub mod graph;
pub mod health;
pub mod predict;

pub use cases::case_routes;
pub use explain::explain_routes;
pub use fusion::fusion_routes;
pub use graph::graph_routes;
pub use health::health_routes;
pub use predict::predict_routes;
