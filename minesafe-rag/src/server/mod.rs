//! HTTP query API.

mod metrics;
mod types;

pub use metrics::HttpMetrics;

pub use types::{
    AnswerResponse, ErrorBody, HazardRequest, HazardResponse, HealthResponse, QueryRequest,
    Reference, ReloadResponse, RetrieveResponse,
};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::domain::RequestId;
use crate::error::{MineRagError, Result};
use crate::ports::{AnswerGenerator, EmbeddingGenerator, IndexRepository};
use crate::services::QueryPipeline;

pub type DynPipeline = QueryPipeline<dyn EmbeddingGenerator, dyn AnswerGenerator>;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DynPipeline>,
    pub repository: Arc<dyn IndexRepository>,
    pub metrics: Arc<HttpMetrics>,
}

impl AppState {
    pub fn new(pipeline: DynPipeline, repository: Arc<dyn IndexRepository>) -> Result<Self> {
        Ok(Self {
            pipeline: Arc::new(pipeline),
            repository,
            metrics: Arc::new(HttpMetrics::new()?),
        })
    }
}

/// Error half of every handler: the error kind picks the status code.
#[derive(Debug)]
pub struct ApiError(pub MineRagError);

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self.0 {
            MineRagError::InvalidQuery(_) | MineRagError::InvalidDetection(_) => {
                StatusCode::BAD_REQUEST
            }
            MineRagError::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MineRagError> for ApiError {
    fn from(err: MineRagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: (&self.0).into(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    Ok(Router::new()
        .route("/health", get(health))
        .route("/metrics", get(export_metrics))
        .route("/rag/query", post(rag_query))
        .route("/rag/answer", post(rag_answer))
        .route("/vision/hazard", post(vision_hazard))
        .route("/index/reload", post(index_reload))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(cors_layer(&config.cors_origins)?)
        .with_state(state))
}

/// Browser access for the listed origins only.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| MineRagError::Config(format!("invalid CORS origin {origin}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true))
}

pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let bind = &config.bind;
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| MineRagError::Config(format!("invalid bind address {bind}")))?;
    let app = router(state, config)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, origins = config.cors_origins.len(), "minesafe API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

async fn log_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = RequestId::generate();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(metrics::UNMATCHED_PATH, MatchedPath::as_str)
        .to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    state.metrics.observe(method.as_str(), &route, status, elapsed);
    info!(
        request_id = %request_id,
        %method,
        path,
        status,
        latency_ms = elapsed.as_millis() as u64,
        "request"
    );
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn export_metrics(
    State(state): State<AppState>,
) -> std::result::Result<Response, ApiError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], body).into_response())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.pipeline.snapshots().try_current().await;
    Json(HealthResponse {
        status: "ok",
        index_loaded: snapshot.is_some(),
        chunks: snapshot.map_or(0, |index| index.len()),
    })
}

pub async fn rag_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<RetrieveResponse>, ApiError> {
    let outcome = state.pipeline.retrieve(&request.query, request.top_k).await?;
    Ok(Json(outcome.into()))
}

pub async fn rag_answer(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<AnswerResponse>, ApiError> {
    let outcome = state.pipeline.answer(&request.query, request.top_k).await?;
    Ok(Json(outcome.into()))
}

pub async fn vision_hazard(
    State(state): State<AppState>,
    Json(request): Json<HazardRequest>,
) -> std::result::Result<Json<HazardResponse>, ApiError> {
    let outcome = state
        .pipeline
        .hazard(request.detections, request.top_k, request.conf)
        .await?;
    Ok(Json(outcome.into()))
}

/// Reloads the persisted index and swaps it in. The old snapshot keeps
/// serving if the artifact is missing, corrupt or built by another model.
pub async fn index_reload(
    State(state): State<AppState>,
) -> std::result::Result<Json<ReloadResponse>, ApiError> {
    let index = state.repository.load().await?;
    index
        .metadata()
        .check_compatible(state.pipeline.embedder())?;
    let response = ReloadResponse {
        status: "reloaded",
        chunks: index.len(),
        embedder_model: index.metadata().embedder_model.clone(),
    };
    state.pipeline.snapshots().install(index).await;
    Ok(Json(response))
}
