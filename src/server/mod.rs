// HTTP server module
// axum routes for starting a load, polling its progress and searching the store

mod error;


use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Config, IngestionConfig};
use crate::corpus::{IngestionRecord, PreparedCorpus, prepare_corpus};
use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::loader::{BatchLoader, LoadError, ProgressSnapshot, ProgressTracker};
use crate::search::{SearchResult, SearchService};
use crate::{LoaderError, Result};

pub use error::{ApiError, ApiResult};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    ingestion: Arc<IngestionConfig>,
    loader: Arc<BatchLoader>,
    search: SearchService,
}

impl AppState {
    #[inline]
    pub fn new(ingestion: IngestionConfig, loader: BatchLoader, search: SearchService) -> Self {
        Self {
            ingestion: Arc::new(ingestion),
            loader: Arc::new(loader),
            search,
        }
    }

    /// Connect the store and embedder described by `config`
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(VectorStore::new(config).await?);
        let embedder = Arc::new(OllamaClient::new(config)?);
        let loader = BatchLoader::new(
            Arc::<VectorStore>::clone(&store),
            Arc::new(ProgressTracker::new()),
            &config.ingestion,
        );
        let search = SearchService::new(embedder, store, config.store.search_limit);

        Ok(Self::new(config.ingestion.clone(), loader, search))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadParams {
    #[serde(default)]
    pub only_records: bool,
    #[serde(default)]
    pub start_offset: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadAccepted {
    pub status: String,
    pub count: usize,
    pub start_offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/embeddings/load", get(load))
        .route("/api/embeddings/progress", get(progress))
        .route("/api/search", post(search))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C
#[inline]
pub async fn serve(config: &Config, addr: SocketAddr) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LoaderError::Server(format!("Server stopped unexpectedly: {}", e)))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn load(
    State(state): State<AppState>,
    Query(params): Query<LoadParams>,
) -> ApiResult<Response> {
    if !params.only_records {
        // Refuse before walking the corpus; `start` re-checks atomically.
        if !state.loader.allows_insert() {
            return Err(LoadError::NotPermitted.into());
        }
        if state.loader.progress().is_inserting() {
            return Err(LoadError::Conflict.into());
        }
    }

    let prepared = prepare(&state.ingestion).await?;
    let records = prepared.records;

    if params.only_records {
        info!("Returning {} records without inserting", records.len());
        return Ok(Json::<Vec<IngestionRecord>>(records).into_response());
    }

    let count = records.len();
    state.loader.start(records, params.start_offset)?;
    info!(
        "Accepted ingestion of {} records from offset {}",
        count, params.start_offset
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(LoadAccepted {
            status: "accepted".to_string(),
            count,
            start_offset: params.start_offset,
        }),
    )
        .into_response())
}

async fn progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.loader.progress().snapshot())
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let results = state.search.search(&request.text, request.limit).await?;
    Ok(Json(SearchResponse { results }))
}

async fn prepare(ingestion: &Arc<IngestionConfig>) -> Result<PreparedCorpus> {
    let ingestion = Arc::clone(ingestion);
    tokio::task::spawn_blocking(move || {
        prepare_corpus(&ingestion.embeddings_root, &ingestion.sources)
    })
    .await
    .map_err(|e| LoaderError::Server(format!("Corpus walk task failed: {}", e)))
}
