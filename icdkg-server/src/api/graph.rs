//! Knowledge graph API handlers
//!
//! GET /api/graph/query, /hierarchy, /explain, /search, /semantic-similarity;
//! POST /api/graph/visualize, /reload

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use icdkg_engine::hierarchy::SnapshotMetadata;
use icdkg_engine::paths::{GraphEdge, GraphNode};
use icdkg_engine::preprocess::Entities;
use icdkg_engine::visualize::{visualize, Visualization};
use icdkg_engine::{
    Candidate, CaseContext, CodeNode, Explanation, MatchResult, PathEntry, PathResolver,
    SimilarityMatcher,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{error::ApiResult, ApiError, AppState};

const DEFAULT_QUERY_DEPTH: u32 = 2;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub icd: Option<String>,
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GraphQueryResponse {
    pub icd_code: String,
    pub icd_info: CodeNode,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub total_nodes: usize,
    pub total_edges: usize,
}

#[derive(Debug, Serialize)]
pub struct HierarchyResponse {
    pub icd_code: String,
    pub path: Vec<PathEntry>,
    pub depth: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<CodeNode>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SimilarityQuery {
    pub concept: Option<String>,
    pub threshold: Option<f64>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    pub concept: String,
    pub threshold: f64,
    pub results: Vec<MatchResult>,
    pub total: usize,
}

/// Prediction payload accepted by the visualize route
///
/// Same shape as the `predictions` field of a snapshot.
#[derive(Debug, Default, Deserialize)]
pub struct VisualizeRequest {
    #[serde(default, rename = "icdPredictions")]
    pub icd_predictions: Vec<Candidate>,
    #[serde(default)]
    pub entities: Entities,
}

#[derive(Debug, Serialize)]
pub struct VisualizeResponse {
    #[serde(flatten)]
    pub view: Visualization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapshotMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: String,
    pub source: String,
    pub codes: usize,
    pub issues: usize,
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("Missing parameter: {}", name))),
    }
}

/// GET /api/graph/query?icd=&depth=
///
/// The code's node plus its neighborhood up to `depth` hops (default 2).
pub async fn query_graph(
    State(state): State<AppState>,
    Query(params): Query<CodeQuery>,
) -> ApiResult<Json<GraphQueryResponse>> {
    let icd = required(params.icd, "icd")?;
    let depth = params.depth.unwrap_or(DEFAULT_QUERY_DEPTH);
    let store = state.store.snapshot();

    let node = store
        .lookup(&icd)
        .ok_or_else(|| ApiError::NotFound(format!("ICD code {}", icd)))?;
    let hood = PathResolver::new(&store)
        .neighborhood(&node.code, depth)
        .unwrap_or_default();

    debug!(icd = %icd, depth, nodes = hood.nodes.len(), "Graph query");

    Ok(Json(GraphQueryResponse {
        icd_code: icd,
        icd_info: node.clone(),
        total_nodes: hood.nodes.len(),
        total_edges: hood.edges.len(),
        nodes: hood.nodes,
        edges: hood.edges,
    }))
}

/// GET /api/graph/hierarchy?icd=
pub async fn hierarchy_path(
    State(state): State<AppState>,
    Query(params): Query<CodeQuery>,
) -> ApiResult<Json<HierarchyResponse>> {
    let icd = required(params.icd, "icd")?;
    let store = state.store.snapshot();

    let path = PathResolver::new(&store).ancestor_path(&icd);
    if path.is_empty() {
        return Err(ApiError::NotFound(format!("ICD code {}", icd)));
    }

    Ok(Json(HierarchyResponse {
        icd_code: icd,
        depth: path.len(),
        path,
    }))
}

/// GET /api/graph/explain?icd=
///
/// Structural explanation only: no case text, no narrative.
pub async fn explain_path(
    State(state): State<AppState>,
    Query(params): Query<CodeQuery>,
) -> ApiResult<Json<Explanation>> {
    let icd = required(params.icd, "icd")?;
    let store = state.store.snapshot();

    let explanation = state.synthesizer.explain_structure(
        &store,
        &state.synonyms,
        &icd,
        &CaseContext::default(),
        0.0,
    )?;
    Ok(Json(explanation))
}

/// GET /api/graph/search?query=&limit=
pub async fn search_codes(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let query = required(params.query, "query")?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let store = state.store.snapshot();

    let results: Vec<CodeNode> = SimilarityMatcher::new(&store, &state.synonyms)
        .keyword_search(&query, limit)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(SearchResponse {
        query,
        total: results.len(),
        results,
    }))
}

/// GET /api/graph/semantic-similarity?concept=&threshold=&max_results=
pub async fn semantic_similarity(
    State(state): State<AppState>,
    Query(params): Query<SimilarityQuery>,
) -> ApiResult<Json<SimilarityResponse>> {
    let concept = required(params.concept, "concept")?;
    let threshold = params.threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::BadRequest(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    let store = state.store.snapshot();

    let results = SimilarityMatcher::new(&store, &state.synonyms).search(&concept, threshold, max_results);

    Ok(Json(SimilarityResponse {
        concept,
        threshold,
        total: results.len(),
        results,
    }))
}

/// POST /api/graph/visualize
///
/// Draws the posted predictions, or the predictions recorded in the
/// current snapshot when the body is absent or unreadable.
pub async fn visualize_predictions(
    State(state): State<AppState>,
    body: Option<Json<VisualizeRequest>>,
) -> ApiResult<Json<VisualizeResponse>> {
    let store = state.store.snapshot();
    let metadata = store.snapshot_metadata().cloned();

    let request = match body {
        Some(Json(request)) => request,
        None => match &metadata {
            Some(meta) => serde_json::from_value(meta.predictions.clone()).unwrap_or_else(|e| {
                warn!("Snapshot predictions unreadable: {}", e);
                VisualizeRequest::default()
            }),
            None => {
                return Ok(Json(VisualizeResponse {
                    view: Visualization::default(),
                    metadata: None,
                    message: Some("No predictions yet; run a prediction first".to_string()),
                }))
            }
        },
    };

    let view = visualize(&store, &request.icd_predictions, &request.entities);
    debug!(nodes = view.nodes.len(), edges = view.edges.len(), "Visualization built");

    Ok(Json(VisualizeResponse {
        view,
        metadata,
        message: None,
    }))
}

/// POST /api/graph/reload
///
/// Re-reads the taxonomy source. On failure the current store stays in place.
pub async fn reload_taxonomy(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let handle = state.store.clone();
    let store = tokio::task::spawn_blocking(move || handle.reload())
        .await
        .map_err(|e| ApiError::Internal(format!("Reload task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Reload failed, keeping current taxonomy: {}", e)))?;

    info!("Taxonomy reloaded via API ({} codes)", store.len());

    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        source: state.store.source().display().to_string(),
        codes: store.len(),
        issues: store.issues().len(),
    }))
}

pub fn graph_routes() -> Router<AppState> {
    Router::new()
        .route("/api/graph/query", get(query_graph))
        .route("/api/graph/hierarchy", get(hierarchy_path))
        .route("/api/graph/explain", get(explain_path))
        .route("/api/graph/search", get(search_codes))
        .route("/api/graph/semantic-similarity", get(semantic_similarity))
        .route("/api/graph/visualize", post(visualize_predictions))
        .route("/api/graph/reload", post(reload_taxonomy))
}
