//! Integration tests for the redraft HTTP API

use std::env;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use redraft::{
    config::Config,
    handlers::create_router,
    models::{AnalysisRequest, AnalysisResult, IMAGE_SENTINEL},
    services::{AnalysisError, AnalysisService, DocumentNormalizer, ExtractError, RawTextExtractor},
    AppState,
};

const API_KEY: &str = "integration-test-key";
const BOUNDARY: &str = "redraft-test-boundary";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Default)]
struct RecordingAnalysis {
    requests: Mutex<Vec<AnalysisRequest>>,
}

#[async_trait]
impl AnalysisService for RecordingAnalysis {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.requests.lock().unwrap().push(request);
        Ok(AnalysisResult {
            overall_score: 82.0,
            summary: "Solid backend profile".to_string(),
            ..Default::default()
        })
    }
}

struct UnconfiguredAnalysis;

#[async_trait]
impl AnalysisService for UnconfiguredAnalysis {
    async fn analyze(&self, _request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        Err(AnalysisError::NotConfigured("GEMINI_API_KEY".to_string()))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Plain-text extractor that stalls on bodies starting with `slow`, so a
/// later upload can overtake it.
struct StallingText;

impl RawTextExtractor for StallingText {
    fn raw_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        if bytes.starts_with(b"slow") {
            std::thread::sleep(Duration::from_millis(500));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 8080,
        max_file_size_mb: 1,
        max_concurrent_requests: 100,
        request_timeout_seconds: 30,
        worker_threads: 1,
        extraction_timeout_seconds: 5,
        max_inline_mb: 1,
        max_sessions: 100,
        session_idle_timeout_seconds: 600,
        gemini_api_key: None,
        gemini_model: "gemini-2.5-flash".to_string(),
        gemini_base_url: "http://127.0.0.1:9".to_string(),
    }
}

fn app_with(analysis: Arc<dyn AnalysisService>) -> Router {
    let config = test_config();
    let normalizer = DocumentNormalizer::new(Duration::from_secs(5), config.max_inline_bytes());
    build_app(config, normalizer, analysis)
}

fn build_app(config: Config, normalizer: DocumentNormalizer, analysis: Arc<dyn AnalysisService>) -> Router {
    // Read once into a static on first auth check; every test sets the same value.
    env::set_var("VALID_API_KEYS", API_KEY);
    create_router(AppState::new(config, normalizer, analysis))
}

fn docx_with(document_xml: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn multipart_body(file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(method: &str, uri: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", API_KEY))
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(file_name, content_type, data)))
        .unwrap()
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", API_KEY));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send(app, authed("POST", "/api/v1/sessions", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "empty");
    body["data"]["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app_with(Arc::new(UnconfiguredAnalysis));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (_, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["accepting_work"], true);
    assert_eq!(body["services"]["analysis"], false);
    assert_eq!(body["rate_limiting"]["capacity"], 100);
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));

    let missing = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_API_KEY");

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_normalize_plain_text_upload() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));

    let (status, body) = send(
        &app,
        upload("POST", "/api/v1/normalize", "notes.txt", "text/plain", b"Hello"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["file_name"], "notes.txt");
    assert_eq!(body["data"]["strategy"], "plain_text");
    assert_eq!(body["data"]["extracted_text"], "Hello");
    assert!(body["data"].get("inline_data").is_none());
}

#[tokio::test]
async fn test_normalize_binary_image() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/normalize/binary")
        .header("authorization", format!("Bearer {}", API_KEY))
        .header("content-type", "image/png")
        .header("x-file-name", "photo.png")
        .body(Body::from(&b"\x89PNG\r\n\x1a\nimage-bytes"[..]))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["file_name"], "photo.png");
    assert_eq!(body["data"]["strategy"], "opaque_image");
    assert_eq!(body["data"]["extracted_text"], IMAGE_SENTINEL);
    assert_eq!(body["data"]["inline_data"]["mime_type"], "image/png");
    assert!(!body["data"]["inline_data"]["data"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_text_file_has_no_usable_content() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));

    let (status, body) = send(
        &app,
        upload("POST", "/api/v1/normalize", "blank.txt", "text/plain", b"   \n\t "),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "NO_USABLE_CONTENT");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));
    let data = vec![b'a'; 1024 * 1024 + 1];

    let (status, body) = send(
        &app,
        upload("POST", "/api/v1/normalize", "huge.txt", "text/plain", &data),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn test_session_upload_analyze_and_clear() {
    let analysis = Arc::new(RecordingAnalysis::default());
    let app = app_with(analysis.clone());
    let id = new_session(&app).await;
    let document_uri = format!("/api/v1/sessions/{}/document", id);
    let analyze_uri = format!("/api/v1/sessions/{}/analyze", id);

    let (status, body) = send(
        &app,
        upload("PUT", &document_uri, "notes.txt", "text/plain", b"Hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "ready");
    assert_eq!(body["data"]["document"]["name"], "notes.txt");
    assert_eq!(body["data"]["document"]["strategy"], "plain_text");

    let (status, body) = send(
        &app,
        authed("POST", &analyze_uri, Some(json!({ "job_description": "Rust developer" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overallScore"], 82.0);

    {
        let seen = analysis.requests.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].resume_text, "Hello");
        assert_eq!(seen[0].job_description, "Rust developer");
        assert!(seen[0].inline_data.is_none());
    }

    let (status, _) = send(
        &app,
        upload("PUT", &document_uri, "photo.png", "image/png", b"\x89PNG\r\n\x1a\n"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, authed("POST", &analyze_uri, Some(json!({})))).await;
    assert_eq!(status, StatusCode::OK);
    {
        let seen = analysis.requests.lock().unwrap();
        let inline = seen[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(seen[1].resume_text, IMAGE_SENTINEL);
    }

    // A rejected document leaves the previous selection in place.
    let (status, body) = send(
        &app,
        upload("PUT", &document_uri, "resume.docx", DOCX_MIME, b"definitely not a zip archive"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "EXTRACTION_FAILED");

    let (_, body) = send(&app, authed("GET", &format!("/api/v1/sessions/{}", id), None)).await;
    assert_eq!(body["data"]["phase"], "ready");
    assert_eq!(body["data"]["document"]["name"], "photo.png");

    let (status, body) = send(&app, authed("DELETE", &document_uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "cleared");
    assert!(body["data"]["document"].is_null());

    let (status, body) = send(&app, authed("POST", &analyze_uri, Some(json!({})))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "NO_USABLE_CONTENT");

    let (status, _) = send(
        &app,
        authed("POST", &analyze_uri, Some(json!({ "resume_text": "Pasted resume" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis.requests.lock().unwrap()[2].resume_text, "Pasted resume");
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));

    let (status, body) = send(
        &app,
        authed("GET", "/api/v1/sessions/00000000-0000-4000-8000-000000000000", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");

    let id = new_session(&app).await;
    let uri = format!("/api/v1/sessions/{}", id);
    let (status, _) = send(&app, authed("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, authed("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analysis_without_backend_is_unavailable() {
    let app = app_with(Arc::new(UnconfiguredAnalysis));
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        authed(
            "POST",
            &format!("/api/v1/sessions/{}/analyze", id),
            Some(json!({ "resume_text": "Jane Doe, engineer" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_binary_upload_falls_back_to_file_name() {
    let app = app_with(Arc::new(RecordingAnalysis::default()));
    let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p></w:body></w:document>"#;

    let generic = Request::builder()
        .method("POST")
        .uri("/api/v1/normalize/binary")
        .header("authorization", format!("Bearer {}", API_KEY))
        .header("content-type", "application/octet-stream")
        .header("x-file-name", "resume.docx")
        .body(Body::from(docx_with(xml)))
        .unwrap();
    let (status, body) = send(&app, generic).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["strategy"], "word_processing");
    assert_eq!(body["data"]["extracted_text"], "Jane Doe\n\n");
    assert!(body["data"].get("inline_data").is_none());

    let untyped = Request::builder()
        .method("POST")
        .uri("/api/v1/normalize/binary")
        .header("authorization", format!("Bearer {}", API_KEY))
        .header("x-file-name", "notes.txt")
        .body(Body::from("Hello"))
        .unwrap();
    let (status, body) = send(&app, untyped).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["media_type"], "");
    assert_eq!(body["data"]["strategy"], "plain_text");
    assert_eq!(body["data"]["extracted_text"], "Hello");
}

#[tokio::test]
async fn test_overtaken_upload_is_rejected_as_superseded() {
    let normalizer = DocumentNormalizer::new(Duration::from_secs(5), 1024 * 1024)
        .with_plain_text_extractor(Arc::new(StallingText));
    let app = build_app(test_config(), normalizer, Arc::new(RecordingAnalysis::default()));
    let id = new_session(&app).await;
    let document_uri = format!("/api/v1/sessions/{}/document", id);

    let first = {
        let app = app.clone();
        let request = upload("PUT", &document_uri, "old.txt", "text/plain", b"slow old resume");
        tokio::spawn(async move { send(&app, request).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (status, body) = send(
        &app,
        upload("PUT", &document_uri, "new.txt", "text/plain", b"new resume"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["document"]["name"], "new.txt");

    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "UPLOAD_SUPERSEDED");

    let (_, body) = send(&app, authed("GET", &format!("/api/v1/sessions/{}", id), None)).await;
    assert_eq!(body["data"]["phase"], "ready");
    assert_eq!(body["data"]["document"]["name"], "new.txt");
}

#[tokio::test]
async fn test_session_limit_blocks_new_sessions_and_readiness() {
    let mut config = test_config();
    config.max_sessions = 1;
    let normalizer = DocumentNormalizer::new(Duration::from_secs(5), config.max_inline_bytes());
    let app = build_app(config, normalizer, Arc::new(RecordingAnalysis::default()));

    let ready = || Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let (status, _) = send(&app, ready()).await;
    assert_eq!(status, StatusCode::OK);

    let id = new_session(&app).await;

    let (status, body) = send(&app, authed("POST", "/api/v1/sessions", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SESSION_LIMIT_REACHED");

    let (status, _) = send(&app, ready()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["sessions"]["active"], 1);

    let (status, _) = send(&app, authed("DELETE", &format!("/api/v1/sessions/{}", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, authed("POST", "/api/v1/sessions", None)).await;
    assert_eq!(status, StatusCode::OK);
}
