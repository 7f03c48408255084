//! System-level route handlers: health, statistics, events, OpenAPI

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use utoipa::OpenApi;

use crate::api::openapi::ApiDoc;
use crate::api::state::AppState;
use crate::error::ToHttpStatus;
use crate::types::Event;

/// Health check endpoint
///
/// Returns basic health status of the server along with its version and
/// uptime. Always responds 200 while the process is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Server is healthy", body = serde_json::Value)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.engine.uptime_secs(),
    }))
}

/// Engine statistics endpoint
///
/// Returns a combined snapshot of the queue, the artifact cache, and the
/// analytics outcome totals.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses(
        (status = 200, description = "Engine statistics", body = crate::types::EngineStats),
        (status = 500, description = "Statistics could not be assembled", body = crate::error::ApiError)
    )
)]
pub async fn engine_stats(State(state): State<AppState>) -> Response {
    match state.engine.engine_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to assemble engine statistics");
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(json!({
                    "error": {
                        "code": e.error_code(),
                        "message": format!("Failed to assemble engine statistics: {}", e)
                    }
                })),
            )
                .into_response()
        }
    }
}

/// OpenAPI specification endpoint
///
/// Returns the OpenAPI 3.0 specification for this API in JSON format.
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification", body = serde_json::Value)
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Server-sent events stream
///
/// Streams engine events in real time: queue admissions, fetch progress,
/// deliveries, sweeps, and lifecycle transitions. Each SSE frame carries
/// the event type as its name and the serialized event as JSON data.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "SSE event stream", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.engine.subscribe());

    let sse_stream = stream.filter_map(|item| match item {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(body) => Some(Ok(SseEvent::default().event(event_name(&event)).data(body))),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unserializable event from SSE stream");
                None
            }
        },
        // A slow client loses events rather than stalling the broadcast;
        // tell it how many so it can resync via /stats.
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber fell behind the event stream");
            Some(Ok(SseEvent::default()
                .event("error")
                .data(format!(r#"{{"error":"lagged","skipped":{}}}"#, skipped))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// SSE frame name for an event, matching the serde `type` tag.
fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Queued { .. } => "queued",
        Event::Started { .. } => "started",
        Event::CacheHit { .. } => "cache_hit",
        Event::Progress { .. } => "progress",
        Event::Retrying { .. } => "retrying",
        Event::FetchSucceeded { .. } => "fetch_succeeded",
        Event::FetchFailed { .. } => "fetch_failed",
        Event::Delivered { .. } => "delivered",
        Event::DeliveryFailed { .. } => "delivery_failed",
        Event::RateLimited { .. } => "rate_limited",
        Event::SweepCompleted { .. } => "sweep_completed",
        Event::AnalyticsWebhookFailed { .. } => "analytics_webhook_failed",
        Event::ApiServerStarted { .. } => "api_server_started",
        Event::ShutdownStarted => "shutdown_started",
        Event::Shutdown => "shutdown",
    }
}
