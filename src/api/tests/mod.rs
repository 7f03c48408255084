//! API integration tests
//!
//! Routes are exercised through `tower::ServiceExt::oneshot` without a live
//! server wherever possible; the SSE stream and the end-to-end test bind a
//! real listener on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use super::create_router;
use crate::channel::NullChannel;
use crate::engine::test_helpers::{build_test_engine, create_test_engine, test_config};
use crate::types::Event;

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_from_origin(app: Router, uri: &str, origin: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok_and_uptime() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime_secs"].is_u64());
}

#[tokio::test]
async fn stats_endpoint_returns_an_engine_snapshot() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get(app, "/stats").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["queue"]["pending"], 0);
    assert_eq!(json["queue"]["active"], 0);
    assert_eq!(json["queue"]["accepting_new"], true);
    assert_eq!(json["cache_entries"], 0);
    assert_eq!(json["totals"]["total"], 0);
}

#[tokio::test]
async fn openapi_json_serves_the_specification() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get(app, "/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert_eq!(json["info"]["title"], "media-dl REST API");
    assert!(json["paths"].get("/health").is_some());
    assert!(json["paths"].get("/stats").is_some());
}

#[tokio::test]
async fn swagger_ui_serves_documentation() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get(app, "/docs/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8_lossy(&body_bytes(response).await).to_lowercase();
    assert!(html.contains("swagger"));
}

#[tokio::test]
async fn cors_is_permissive_when_no_origins_are_configured() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get_from_origin(app, "/health", "http://example.com").await;

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn cors_restricts_to_listed_origins() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.server.cors_origins = vec!["http://allowed.test".to_string()];
    let engine = build_test_engine(config, Arc::new(NullChannel::new())).await;
    let app = create_router(engine);

    let allowed = get_from_origin(app.clone(), "/health", "http://allowed.test").await;
    assert_eq!(
        allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://allowed.test")
    );

    let denied = get_from_origin(app, "/health", "http://other.test").await;
    assert!(denied
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn artifacts_are_served_from_the_storage_directory() {
    let (engine, _dir) = create_test_engine().await;
    let storage = engine.get_config().storage_dir().clone();
    std::fs::write(storage.join("abc123.mp4"), b"fake video bytes").unwrap();
    let app = create_router(engine);

    let response = get(app, "/artifacts/abc123.mp4").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"fake video bytes");
}

#[tokio::test]
async fn missing_artifacts_return_not_found() {
    let (engine, _dir) = create_test_engine().await;
    let app = create_router(engine);

    let response = get(app, "/artifacts/never-fetched.mp4").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_stream_delivers_engine_events() {
    let (engine, _dir) = create_test_engine().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(super::serve(engine.clone(), listener));

    let mut response = reqwest::get(format!("http://{}/events", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The handler subscribed before the response headers went out, so an
    // event emitted now is guaranteed to reach the stream.
    engine.emit_event(Event::Shutdown);

    let mut buf = String::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !buf.contains("\n\n") {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        let chunk = tokio::time::timeout(remaining, response.chunk())
            .await
            .expect("timed out waiting for an SSE frame")
            .unwrap()
            .expect("stream ended before a frame arrived");
        buf.push_str(&String::from_utf8_lossy(&chunk));
    }

    assert!(buf.contains("event: shutdown"), "got frame: {}", buf);
    assert!(buf.contains("data:"));
}

#[tokio::test]
async fn server_responds_over_a_real_connection() {
    let (engine, _dir) = create_test_engine().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(super::serve(engine, listener));

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}
