//! Prediction API handler
//!
//! POST /api/predict

use axum::{extract::State, routing::post, Json, Router};
use icdkg_common::db::{CaseCode, CaseRecord};
use icdkg_engine::predictor::Prediction;
use icdkg_engine::preprocess::Entities;
use icdkg_engine::snapshot::PredictionSnapshot;
use icdkg_engine::Candidate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{error::ApiResult, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(alias = "case_text")]
    pub case_text: String,
    #[serde(default)]
    pub params: Option<PredictOverrides>,
}

/// Per-request overrides of the configured prediction defaults
#[derive(Debug, Default, Deserialize)]
pub struct PredictOverrides {
    pub top_k: Option<usize>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub model: String,
    pub icd_predictions: Vec<Candidate>,
    pub entities: Entities,
    pub preprocessed_text: String,
    pub snapshot_written: bool,
}

/// POST /api/predict
///
/// Preprocess the case, rank candidate codes, record a snapshot when one
/// is configured and hand the result to the case store in the background.
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> ApiResult<Json<PredictResponse>> {
    let text = request.case_text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("caseText must not be empty".to_string()));
    }

    let mut params = state.prediction;
    if let Some(overrides) = request.params {
        if let Some(top_k) = overrides.top_k {
            params.top_k = top_k;
        }
        if let Some(threshold) = overrides.threshold {
            params.threshold = threshold;
        }
    }
    if params.top_k == 0 {
        return Err(ApiError::BadRequest("top_k must be at least 1".to_string()));
    }
    if !(0.0..=1.0).contains(&params.threshold) {
        return Err(ApiError::BadRequest(format!(
            "threshold must be within [0, 1], got {}",
            params.threshold
        )));
    }

    let context = state.preprocessor.preprocess(&text);
    let preprocessed_text = context.preprocessed_text();
    let mut prediction = state.predictor.predict(&preprocessed_text, &params);
    if prediction.entities.is_empty() {
        prediction.entities = context.entities.clone();
    }
    info!(
        model = %prediction.model,
        candidates = prediction.candidates.len(),
        "Prediction complete"
    );

    let snapshot_written = write_snapshot(&state, &text, &prediction, params.top_k, params.threshold).await;
    store_case(&state, &text, &preprocessed_text, &prediction);

    Ok(Json(PredictResponse {
        model: prediction.model,
        icd_predictions: prediction.candidates,
        entities: prediction.entities,
        preprocessed_text,
        snapshot_written,
    }))
}

/// Write the snapshot file; reload the store when it reads that same file
async fn write_snapshot(
    state: &AppState,
    text: &str,
    prediction: &Prediction,
    top_k: usize,
    threshold: f64,
) -> bool {
    let Some(path) = state.snapshot_path.clone() else {
        return false;
    };
    let snapshot = {
        let store = state.store.snapshot();
        PredictionSnapshot::from_candidates(text, prediction, top_k, threshold, Some(&store))
    };
    let handle = state.store.clone();

    let written = tokio::task::spawn_blocking(move || {
        if let Err(e) = snapshot.write_to(&path) {
            warn!("Prediction snapshot not written to {}: {}", path.display(), e);
            return false;
        }
        if path.as_path() == handle.source() {
            if let Err(e) = handle.reload() {
                warn!("Reload after snapshot failed: {}", e);
            }
        }
        true
    })
    .await;

    written.unwrap_or_else(|e| {
        error!("Snapshot task failed: {}", e);
        false
    })
}

/// Fire-and-forget persistence; failures are only logged
fn store_case(state: &AppState, text: &str, preprocessed_text: &str, prediction: &Prediction) {
    let Some(cases) = state.cases.clone() else {
        return;
    };
    let record = CaseRecord {
        case_text: text.to_string(),
        preprocessed_text: Some(preprocessed_text.to_string()),
        codes: prediction
            .candidates
            .iter()
            .map(|c| CaseCode {
                code: c.code.clone(),
                name: c.name.clone(),
                probability: c.probability,
            })
            .collect(),
        metadata: Some(json!({
            "model": prediction.model,
            "entities": prediction.entities,
        })),
    };

    tokio::spawn(async move {
        match cases.persist(&record).await {
            Ok(id) => debug!(case_id = %id, "Case stored"),
            Err(e) => error!("Failed to store case: {}", e),
        }
    });
}

pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/api/predict", post(predict))
}
