//! icdkg-server library interface
//!
//! Thin HTTP surface over the knowledge engine. Exposed as a library so
//! the router can be exercised in integration tests.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use icdkg_common::config::TomlConfig;
use icdkg_common::db::CaseStore;
use icdkg_engine::predictor::PredictParams;
use icdkg_engine::preprocess::PreprocessOptions;
use icdkg_engine::{ExplanationSynthesizer, MockPredictor, Predictor, Preprocessor, StoreHandle, SynonymIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Current taxonomy; handlers take one snapshot per request
    pub store: Arc<StoreHandle>,
    pub synonyms: Arc<SynonymIndex>,
    pub preprocessor: Arc<Preprocessor>,
    pub predictor: Arc<dyn Predictor>,
    pub synthesizer: Arc<ExplanationSynthesizer>,
    /// Optional case sink
    pub cases: Option<CaseStore>,
    /// Where prediction snapshots are written, if anywhere
    pub snapshot_path: Option<PathBuf>,
    /// Defaults for requests that do not carry their own parameters
    pub prediction: PredictParams,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: &TomlConfig,
        store: StoreHandle,
        synonyms: SynonymIndex,
        synthesizer: ExplanationSynthesizer,
    ) -> Self {
        let preprocessing = &config.preprocessing;
        Self {
            store: Arc::new(store),
            synonyms: Arc::new(synonyms),
            preprocessor: Arc::new(Preprocessor::new(PreprocessOptions {
                max_text_length: preprocessing.max_text_length,
                remove_stopwords: preprocessing.remove_stopwords,
                keep_numbers: preprocessing.keep_numbers,
            })),
            predictor: Arc::new(MockPredictor::new(config.prediction.model.clone())),
            synthesizer: Arc::new(synthesizer),
            cases: None,
            snapshot_path: config.snapshot_path.clone(),
            prediction: PredictParams {
                top_k: config.prediction.top_k,
                threshold: config.prediction.threshold,
            },
            startup_time: Utc::now(),
        }
    }

    pub fn with_cases(mut self, cases: CaseStore) -> Self {
        self.cases = Some(cases);
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = predictor;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::graph_routes())
        .merge(api::explain_routes())
        .merge(api::predict_routes())
        .merge(api::fusion_routes())
        .merge(api::case_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
