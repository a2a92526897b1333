//! Stored case API handlers
//!
//! GET /api/cases, GET /api/cases/:id

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use icdkg_common::db::{CaseStore, StoredCase};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiResult, ApiError, AppState};

const DEFAULT_RECENT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

fn case_store(state: &AppState) -> ApiResult<&CaseStore> {
    state
        .cases
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Case storage is not configured".to_string()))
}

/// GET /api/cases/:id
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StoredCase>> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest(format!("Invalid case id: {}", id)))?;
    let cases = case_store(&state)?;

    cases
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Case {}", id)))
}

/// GET /api/cases?limit=
pub async fn recent_cases(
    State(state): State<AppState>,
    Query(params): Query<RecentQuery>,
) -> ApiResult<Json<Vec<StoredCase>>> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".to_string()));
    }
    Ok(Json(case_store(&state)?.recent(limit).await?))
}

pub fn case_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cases", get(recent_cases))
        .route("/api/cases/:id", get(get_case))
}
