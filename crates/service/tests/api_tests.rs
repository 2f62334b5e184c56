//! Integration tests for the service API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use potability_lib::{
    health::HealthRegistry,
    predictor::{
        ArtifactPair, ArtifactStore, Classifier, ForestParams, PredictionEngine, RandomForest,
        Scaler, StandardScaler,
    },
    schema::canonical_feature_names,
    synthetic::{generate, SyntheticConfig},
};
use potability_service::{create_router, AppState};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SAFE_SAMPLE: [f64; 9] = [7.0, 200.0, 20000.0, 7.0, 300.0, 500.0, 15.0, 80.0, 4.0];

async fn setup_app(model_dir: &Path, api_key: Option<&str>) -> (Router, Arc<AppState>) {
    let engine = Arc::new(PredictionEngine::new(model_dir));
    engine.load_or_fallback();

    let health_registry = HealthRegistry::new();
    health_registry.sync_with(&engine).await;
    health_registry.set_ready(true).await;

    let state = Arc::new(
        AppState::new(engine, health_registry).with_api_key(api_key.map(str::to_string)),
    );
    (create_router(state.clone()), state)
}

fn write_artifacts(dir: &Path, version: &str) {
    let data = generate(&SyntheticConfig {
        samples: 200,
        ..Default::default()
    });
    let scaler = StandardScaler::fit(&data.features);
    let params = ForestParams {
        n_estimators: 10,
        max_depth: Some(6),
        ..Default::default()
    };
    let forest = RandomForest::fit(&scaler.transform(&data.features), &data.targets, params);
    let pair = ArtifactPair::new(
        Scaler::Standard(scaler),
        Classifier::Trained(forest),
        canonical_feature_names(),
        version,
    )
    .unwrap();
    ArtifactStore::new(dir).save(&pair).unwrap();
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_banner() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_reports_fallback_as_degraded() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["model_version"], "fallback-1.0.0");
    assert_eq!(body["components"]["engine"]["status"], "degraded");
}

#[tokio::test]
async fn test_readyz_before_and_after_ready() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_app(dir.path(), None).await;

    state.health_registry.set_ready(false).await;
    let (status, body) = send(app.clone(), get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, _) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_fallback_sample_is_safe() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(
        app,
        post_json("/predict", json!({ "features": SAFE_SAMPLE })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["label"], "Safe");
    assert_eq!(body["model_version"], "fallback-1.0.0");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&confidence));
}

#[tokio::test]
async fn test_predict_named_record() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let record: serde_json::Map<String, Value> = canonical_feature_names()
        .into_iter()
        .zip(SAFE_SAMPLE)
        .map(|(name, value)| (name, json!(value)))
        .collect();

    let (status, body) = send(app, post_json("/predict", json!({ "record": record }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Safe");
}

#[tokio::test]
async fn test_predict_wrong_length_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(
        app,
        post_json("/predict", json!({ "features": [7.0, 200.0, 20000.0] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Invalid input data");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("expected 9 features, got 3"));
}

#[tokio::test]
async fn test_predict_out_of_range_ph_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let mut sample = SAFE_SAMPLE;
    sample[0] = 15.0;
    let (status, body) = send(app, post_json("/predict", json!({ "features": sample }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("pH"));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid input data");
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let mut unsafe_sample = SAFE_SAMPLE;
    unsafe_sample[0] = 4.0;
    let (status, body) = send(
        app,
        post_json(
            "/predict/batch",
            json!({ "batch": [SAFE_SAMPLE, unsafe_sample, SAFE_SAMPLE] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["prediction"], 1);
    assert_eq!(results[1]["prediction"], 0);
    assert_eq!(results[2]["prediction"], 1);
}

#[tokio::test]
async fn test_batch_over_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let batch = vec![SAFE_SAMPLE; 101];
    let (status, body) = send(app, post_json("/predict/batch", json!({ "batch": batch }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("maximum 100"));
}

#[tokio::test]
async fn test_batch_with_one_bad_row_fails_whole_batch() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(
        app,
        post_json("/predict/batch", json!({ "batch": [SAFE_SAMPLE.to_vec(), vec![1.0, 2.0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_object());
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), Some("secret")).await;

    let response = app
        .clone()
        .oneshot(post_json("/predict", json!({ "features": SAFE_SAMPLE })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    let mut request = post_json("/predict", json!({ "features": SAFE_SAMPLE }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer wrong".parse().unwrap(),
    );
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post_json("/predict", json!({ "features": SAFE_SAMPLE }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer secret".parse().unwrap(),
    );
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    // health stays open
    let (status, _) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_model_info_on_fallback() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, body) = send(app, get("/model/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["model_kind"], "RuleBasedClassifier");
    assert_eq!(body["feature_names"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn test_reload_picks_up_new_artifacts() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_app(dir.path(), None).await;
    assert!(!state.engine.as_ref().unwrap().is_loaded());

    write_artifacts(dir.path(), "rf-reload");

    let request = Request::builder()
        .method("POST")
        .uri("/model/reload")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["model"]["model_loaded"], true);
    assert_eq!(body["model"]["version"], "rf-reload");

    let (_, health) = send(app.clone(), get("/health")).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_version"], "rf-reload");

    let (status, result) = send(
        app,
        post_json("/predict", json!({ "features": SAFE_SAMPLE })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["model_version"], "rf-reload");
}

#[tokio::test]
async fn test_missing_engine_is_unavailable() {
    let state = Arc::new(AppState {
        engine: None,
        ..AppState::new(
            Arc::new(PredictionEngine::new("/nonexistent")),
            HealthRegistry::new(),
        )
    });
    let app = create_router(state);

    let (status, body) = send(app, post_json("/predict", json!({ "features": SAFE_SAMPLE }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Predictor not available");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prediction_counters() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = setup_app(dir.path(), None).await;

    let (status, _) = send(
        app.clone(),
        post_json("/predict", json!({ "features": SAFE_SAMPLE })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("potability_predictions_total"));
    assert!(text.contains("potability_prediction_latency_seconds"));
}
