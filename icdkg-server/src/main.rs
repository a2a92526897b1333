//! icdkg-server - ICD code-hierarchy knowledge service
//!
//! Loads the taxonomy and synonym sources, resolves the narrative
//! generator once, then serves the JSON API until Ctrl+C/SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use icdkg_common::config::ConfigResolver;
use icdkg_common::db::CaseStore;
use icdkg_common::logging::init_tracing;
use icdkg_engine::{ExplanationSynthesizer, StoreHandle, SynonymIndex};
use icdkg_server::{build_router, services::resolve_narrator, AppState};
use tokio::signal;
use tracing::info;

/// Command-line arguments for icdkg-server
#[derive(Parser, Debug)]
#[command(name = "icdkg-server")]
#[command(about = "ICD code-hierarchy knowledge service")]
#[command(version)]
struct Args {
    /// Config file (overrides ICDKG_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Taxonomy source (plain hierarchy or prediction snapshot)
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Synonym mapping source
    #[arg(long)]
    synonyms: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config).resolve();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.taxonomy {
        config.taxonomy_path = path;
    }
    if let Some(path) = args.synonyms {
        config.synonyms_path = path;
    }

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!("Starting icdkg-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Taxonomy: {}", config.taxonomy_path.display());

    let store = StoreHandle::open(config.taxonomy_path.clone());
    let synonyms = SynonymIndex::load_or_empty(&config.synonyms_path);
    info!(
        "Knowledge loaded: {} codes, {} synonym entries",
        store.snapshot().len(),
        synonyms.len()
    );

    let synthesizer = ExplanationSynthesizer::new(resolve_narrator(&config.narrative));
    let mut state = AppState::new(&config, store, synonyms, synthesizer);

    if let Some(db_path) = &config.database_path {
        let cases = CaseStore::open(db_path)
            .await
            .with_context(|| format!("Failed to open case store {}", db_path.display()))?;
        info!("Case storage: {}", db_path.display());
        state = state.with_cases(cases);
    }

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
