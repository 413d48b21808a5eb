//! Integration tests for the conform API endpoints.
//!
//! The router runs against the scripted media engine, with local source
//! files allowed, so the full pipeline executes without ffmpeg.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use conform_core::config::Settings;
use conform_core::engine::testing::ScriptedEngine;
use conform_core::models::PIPELINE_TAG;
use conform_core::orchestrator::ConformService;
use conform_core::source::HttpFetcher;
use conform_core::store::FsResultStore;
use conform_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Test helper: service backed by a scripted engine and a 10 s source clip
struct TestApp {
    dir: TempDir,
    source: PathBuf,
    state: AppState,
}

impl TestApp {
    fn new(engine: ScriptedEngine) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.wav");
        ScriptedEngine::write_clip(&source, 10_000).unwrap();

        let mut settings = Settings::default();
        settings.paths.temp_root = dir.path().join("temp").to_string_lossy().to_string();
        settings.paths.store_folder = dir.path().join("out").to_string_lossy().to_string();

        let store = FsResultStore::new(&settings.paths.store_folder, "chronique").unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).allow_local_files(true);
        let service =
            ConformService::new(settings, Arc::new(engine), Arc::new(fetcher), Arc::new(store));

        Self {
            dir,
            source,
            state: AppState::new(service),
        }
    }

    fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    fn source_url(&self) -> String {
        self.source.to_string_lossy().to_string()
    }

    /// Write another scripted clip next to the default source.
    fn write_source(&self, name: &str, duration_ms: u64) -> String {
        let path = self.dir.path().join(name);
        ScriptedEngine::write_clip(&path, duration_ms).unwrap();
        path.to_string_lossy().to_string()
    }

    async fn process(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/process")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_module_and_version() {
    let app = TestApp::new(ScriptedEngine::new());
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "audio-conform");
    assert!(body["version"].is_string());
}

// =============================================================================
// Process + download
// =============================================================================

#[tokio::test]
async fn process_then_download_mp3() {
    let app = TestApp::new(ScriptedEngine::new());
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["final_duration_ms"], 9000);
    assert_eq!(body["factor"], 0.9);
    assert_eq!(body["factor_correction"], 1.0);
    assert_eq!(body["pipeline"], PIPELINE_TAG);
    assert_eq!(body["meta"]["input_duration_ms"], 10_000);
    assert_eq!(body["meta"]["post_norm_ms"], 9000);

    let url = body["download_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/dl/chronique_"));
    assert!(url.ends_with("_9000.mp3"));

    let response = app.get(&url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let name = url.trim_start_matches("/dl/");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("inline; filename=\"{}\"", name).as_str()
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"scripted-audio:"));
}

#[tokio::test]
async fn wav_download_has_wav_content_type() {
    let app = TestApp::new(ScriptedEngine::new());
    let (status, body) = app
        .process(json!({
            "audio_url": app.source_url(),
            "target_duration_ms": 11000,
            "format_out": "wav"
        }))
        .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    let url = body["download_url"].as_str().unwrap();
    assert!(url.ends_with(".wav"));

    let response = app.get(url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn target_out_of_range_is_413() {
    let app = TestApp::new(ScriptedEngine::new());
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 0}))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["detail"], "target_duration_ms out of bounds (0, 180000]");
}

#[tokio::test]
async fn stretch_out_of_bounds_is_422() {
    let app = TestApp::new(ScriptedEngine::new());
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 7000}))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_bounds");
    assert_eq!(body["detail"], "Stretch factor 0.700 outside [0.8,1.25]");
}

#[tokio::test]
async fn zero_length_source_is_422() {
    let app = TestApp::new(ScriptedEngine::new());
    let url = app.write_source("zero.wav", 0);
    let (status, body) = app
        .process(json!({"audio_url": url, "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {}", body);
    assert_eq!(body["error"], "out_of_bounds");
    assert_eq!(body["detail"], "Cannot stretch a source of zero duration");
}

#[tokio::test]
async fn missing_source_is_400() {
    let app = TestApp::new(ScriptedEngine::new());
    let (status, body) = app
        .process(json!({"audio_url": "/nonexistent/clip.wav", "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "download");
}

#[tokio::test]
async fn loudness_block_missing_is_424() {
    let app = TestApp::new(ScriptedEngine::new().with_measurement_stderr("no json here"));
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
    assert_eq!(body["error"], "analysis");
}

#[tokio::test]
async fn engine_failure_is_502_with_diagnostics() {
    let app = TestApp::new(ScriptedEngine::new().failing_on_call(1));
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "engine");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("scripted failure on call 1"));
}

#[tokio::test]
async fn final_mismatch_is_500_integrity() {
    let app = TestApp::new(ScriptedEngine::new().with_encode_drift(5));
    let (status, body) = app
        .process(json!({"audio_url": app.source_url(), "target_duration_ms": 9000}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "integrity");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("9005 ms vs target 9000 ms"));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = TestApp::new(ScriptedEngine::new());
    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"audio_url\": "))
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "malformed");
}

#[tokio::test]
async fn unknown_artifact_is_404() {
    let app = TestApp::new(ScriptedEngine::new());

    let response = app.get("/dl/chronique_missing_9000.mp3").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["detail"], "Not found");

    let response = app.get("/dl/..%2Fclip.wav").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
