//! Prediction fusion API handler
//!
//! POST /api/fusion

use axum::{extract::State, routing::post, Json, Router};
use icdkg_engine::paths::Constraints;
use icdkg_engine::{fuse, Candidate, FusionCandidate, PathResolver};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FusionRequest {
    /// One ranking per model
    pub rankings: Vec<Vec<Candidate>>,
    /// One weight per ranking; uniform when omitted
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Optional structural filter applied after fusion
    #[serde(default)]
    pub constraints: Option<Constraints>,
}

#[derive(Debug, Serialize)]
pub struct FusionResponse {
    pub candidates: Vec<FusionCandidate>,
    pub total: usize,
    /// Candidates removed by the constraints
    pub filtered: usize,
}

/// POST /api/fusion
pub async fn fuse_rankings(
    State(state): State<AppState>,
    Json(request): Json<FusionRequest>,
) -> ApiResult<Json<FusionResponse>> {
    let fused = fuse(&request.rankings, request.weights.as_deref())?;
    let before = fused.len();

    let candidates = match request.constraints.filter(|c| !c.is_empty()) {
        Some(constraints) => {
            let store = state.store.snapshot();
            PathResolver::new(&store).filter_by_constraints(fused, &constraints)
        }
        None => fused,
    };

    Ok(Json(FusionResponse {
        total: candidates.len(),
        filtered: before - candidates.len(),
        candidates,
    }))
}

pub fn fusion_routes() -> Router<AppState> {
    Router::new().route("/api/fusion", post(fuse_rankings))
}
