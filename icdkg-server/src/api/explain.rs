//! Case explanation API handler
//!
//! POST /api/explain

use axum::{extract::State, routing::post, Json, Router};
use icdkg_engine::Explanation;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiResult, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    /// Case text; may be empty for a purely structural explanation
    #[serde(default)]
    pub text: String,
    pub icd_code: String,
    #[serde(default)]
    pub probability: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub success: bool,
    pub icd_code: String,
    pub explanation: Explanation,
}

/// POST /api/explain
///
/// Explain one code against a case, with a narrative when a generator
/// is configured and answers.
pub async fn explain_prediction(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<Json<ExplainResponse>> {
    let icd_code = request.icd_code.trim().to_string();
    if icd_code.is_empty() {
        return Err(ApiError::BadRequest("icd_code must not be empty".to_string()));
    }

    let context = state.preprocessor.preprocess(&request.text);
    let store = state.store.snapshot();
    let explanation = state
        .synthesizer
        .explain(
            &store,
            &state.synonyms,
            &icd_code,
            &context,
            request.probability.unwrap_or(0.0),
        )
        .await?;

    debug!(
        icd = %icd_code,
        narrative = explanation.narrative.is_some(),
        "Explanation generated"
    );

    Ok(Json(ExplainResponse {
        success: true,
        icd_code,
        explanation,
    }))
}

pub fn explain_routes() -> Router<AppState> {
    Router::new().route("/api/explain", post(explain_prediction))
}
