//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use minivault_llm::audit::{AuditLogger, DailyJsonlSink, LogRecord};
use minivault_llm::backend::{GenerationBackend, RemoteBackend, StubBackend, STUB_RESPONSES};
use minivault_llm::RequestHandler;
use minivault_web::router::build_router;
use minivault_web::state::AppState;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(backend: Arc<dyn GenerationBackend>, logger: &AuditLogger) -> Router {
    let handler = RequestHandler::new(backend, logger.handle());
    build_router(AppState::new(handler))
}

fn stub() -> Arc<dyn GenerationBackend> {
    Arc::new(StubBackend::new().with_char_delay(Duration::ZERO))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn read_records(log_dir: &Path) -> Vec<LogRecord> {
    std::fs::read_to_string(DailyJsonlSink::new(log_dir).today_path())
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_generate_returns_canned_response_and_logs_it() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let response = app(stub(), &logger)
        .oneshot(post_json("/generate", json!({"prompt": "Hello, world!"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    let text = body["response"].as_str().unwrap();
    assert!(STUB_RESPONSES.contains(&text));
    logger.close().await;

    let records = read_records(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prompt, "Hello, world!");
    assert!(records[0].duration_ms >= 0.0);
}

#[tokio::test]
async fn test_stream_returns_plain_text_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let response = app(stub(), &logger)
        .oneshot(post_json("/stream", json!({"prompt": "Stream test."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = body_string(response).await;
    let expected: Vec<String> = STUB_RESPONSES
        .iter()
        .map(|r| r.split_whitespace().map(|w| format!("{w} ")).collect())
        .collect();
    assert!(expected.contains(&text));
    logger.close().await;

    let records = read_records(dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "/stream");
    assert_eq!(records[0].response, text);
}

#[tokio::test]
async fn test_empty_prompt_is_rejected_before_backend() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let response = app(stub(), &logger)
        .oneshot(post_json("/generate", json!({"prompt": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));
    logger.close().await;

    assert!(read_records(dir.path()).is_empty());
}

#[tokio::test]
async fn test_oversized_prompt_is_rejected_on_stream() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());
    let handler = RequestHandler::new(stub(), logger.handle());
    let router = build_router(AppState::new(handler).with_max_prompt_chars(5));

    let response = router
        .oneshot(post_json("/stream", json!({"prompt": "too long"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    logger.close().await;
}

#[tokio::test]
async fn test_missing_prompt_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let response = app(stub(), &logger)
        .oneshot(post_json("/generate", json!({"text": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("prompt"));
    logger.close().await;
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let syntax_error = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"prompt\": "))
        .unwrap();
    let no_content_type = Request::builder()
        .method("POST")
        .uri("/stream")
        .body(Body::from(json!({"prompt": "hi"}).to_string()))
        .unwrap();

    for (request, status) in [
        (syntax_error, StatusCode::BAD_REQUEST),
        (no_content_type, StatusCode::UNSUPPORTED_MEDIA_TYPE),
    ] {
        let response = app(stub(), &logger).oneshot(request).await.unwrap();
        assert_eq!(response.status(), status);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].is_string(), "{body}");
    }
    logger.close().await;

    assert!(read_records(dir.path()).is_empty());
}

#[tokio::test]
async fn test_remote_failure_maps_to_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());
    let remote: Arc<dyn GenerationBackend> =
        Arc::new(RemoteBackend::new(server.uri(), "tinyllama").unwrap());

    let response = app(remote.clone(), &logger)
        .oneshot(post_json("/generate", json!({"prompt": "Hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app(remote, &logger)
        .oneshot(post_json("/stream", json!({"prompt": "Hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    logger.close().await;

    assert!(read_records(dir.path()).is_empty());
}

#[tokio::test]
async fn test_remote_garbage_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());
    let remote = Arc::new(RemoteBackend::new(server.uri(), "tinyllama").unwrap());

    let response = app(remote, &logger)
        .oneshot(post_json("/generate", json!({"prompt": "Hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    logger.close().await;
}

#[tokio::test]
async fn test_health_reports_backend() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(dir.path());

    let response = app(stub(), &logger)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["llm_type"], "stubbed");
    logger.close().await;
}
