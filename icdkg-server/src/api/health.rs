//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Codes in the current taxonomy
    pub codes: usize,
    /// Codes with synonym entries
    pub synonym_codes: usize,
    /// Configured narrative generator ("none" when unavailable)
    pub narrator: String,
    pub case_storage: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "icdkg-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        codes: state.store.snapshot().len(),
        synonym_codes: state.synonyms.len(),
        narrator: state.synthesizer.narrator_name().to_string(),
        case_storage: state.cases.is_some(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
