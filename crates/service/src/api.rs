//! HTTP API: predictions, model administration, health and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use potability_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::ServiceMetrics,
    predictor::{ModelDescription, PredictionEngine, PredictionResult},
    schema::FeatureInput,
    PredictError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Option<Arc<PredictionEngine>>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub api_key: Option<String>,
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(engine: Arc<PredictionEngine>, health_registry: HealthRegistry) -> Self {
        Self {
            engine: Some(engine),
            health_registry,
            metrics: ServiceMetrics::new(),
            api_key: None,
            max_batch_size: 100,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    fn engine(&self) -> Result<Arc<PredictionEngine>, ApiError> {
        self.engine.clone().ok_or(ApiError::Unavailable)
    }
}

/// Error body: `{"status": "error", "message": ..., "detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest { message: String, detail: Option<String> },
    Unauthorized,
    Unavailable,
    Internal(String),
}

impl ApiError {
    fn invalid_input(detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: "Invalid input data".to_string(),
            detail: Some(detail.into()),
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ApiError::invalid_input(e.to_string()),
            PredictError::Unavailable => ApiError::Unavailable,
            PredictError::Failed(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest { message, detail } => {
                warn!(reason = %message, detail = ?detail, "Rejected request");
                (StatusCode::BAD_REQUEST, message, detail)
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing API key".to_string(),
                None,
            ),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Predictor not available".to_string(),
                None,
            ),
            ApiError::Internal(detail) => {
                // internal detail stays in the logs
                error!(detail = %detail, "Prediction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Prediction failed".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
            "detail": detail,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Single prediction body: an ordered vector or a named record
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Features { features: Vec<f64> },
    Record { record: HashMap<String, f64> },
}

impl From<PredictRequest> for FeatureInput {
    fn from(request: PredictRequest) -> Self {
        match request {
            PredictRequest::Features { features } => FeatureInput::Values(features),
            PredictRequest::Record { record } => FeatureInput::Named(record),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub batch: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub model: ModelDescription,
}

/// Rejects requests without the configured bearer token
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.api_key {
        let token = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if token != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Water potability prediction service running",
        "status": "healthy",
        "version": SERVICE_VERSION,
    }))
}

/// Returns 200 if healthy or degraded, 503 if unhealthy
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Some(engine) = &state.engine {
        state.health_registry.sync_with(engine).await;
    }
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let engine = state.engine()?;
    let Json(request) = body?;
    let result = engine.predict(request)?;
    Ok(Json(result))
}

async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchPredictRequest>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>, ApiError> {
    let engine = state.engine()?;
    let Json(request) = body?;

    if request.batch.len() > state.max_batch_size {
        return Err(ApiError::BadRequest {
            message: format!(
                "Batch size too large (maximum {} samples)",
                state.max_batch_size
            ),
            detail: Some(format!("received {} samples", request.batch.len())),
        });
    }

    info!(samples = request.batch.len(), "Batch prediction request");
    let results = engine.predict_batch(request.batch)?;
    Ok(Json(results))
}

async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelDescription>, ApiError> {
    Ok(Json(state.engine()?.describe()))
}

async fn model_reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let engine = state.engine()?;
    info!("Reloading model");

    // artifact parsing and checksums are blocking file I/O
    let description = tokio::task::spawn_blocking(move || engine.reload())
        .await
        .map_err(|e| ApiError::Internal(format!("reload task failed: {}", e)))?;

    state.health_registry.record_model(&description).await;

    Ok(Json(ReloadResponse {
        status: "success",
        message: "Model reloaded",
        model: description,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .route("/model/info", get(model_info))
        .route("/model/reload", post(model_reload))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .merge(protected)
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
