//! REST API server
//!
//! A small OpenAPI-documented surface for watching the engine from the
//! outside: health, statistics, a server-sent event stream, and static
//! serving of retained artifacts for link-mode deliveries.

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::MediaDownloader;
use crate::error::Error;
use crate::Result;

pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Assemble the full router: `/health`, `/stats`, `/events` (SSE),
/// `/artifacts/*` (static files for link-mode delivery), `/openapi.json`,
/// and the Swagger UI under `/docs`.
pub fn create_router(engine: MediaDownloader) -> Router {
    let config = engine.get_config();
    let cors = build_cors_layer(&config.server.cors_origins);
    let artifacts = ServeDir::new(config.storage_dir());

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/stats", get(routes::engine_stats))
        .route("/events", get(routes::event_stream))
        .route("/openapi.json", get(routes::openapi_spec))
        .nest_service("/artifacts", artifacts)
        // Swagger UI serves its own assets, so merge it before attaching state
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
        .with_state(AppState::new(engine))
        // Layer order matters: the last layer added runs first on requests
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build a CORS layer from the configured origins.
///
/// An empty list or a literal `*` entry means any origin. Methods and
/// headers are unrestricted either way, since the API is read-only.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Serve the API on an already-bound listener until the server stops.
///
/// The engine binds the listener at construction time so that port
/// conflicts surface as constructor errors instead of background-task
/// logs; this function only attaches the router and runs it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_dl::channel::NullChannel;
/// use media_dl::{Config, MediaDownloader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let engine = MediaDownloader::new(config, Arc::new(NullChannel::new())).await?;
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
/// media_dl::api::serve(engine, listener).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(engine: MediaDownloader, listener: TcpListener) -> Result<()> {
    let app = create_router(engine);

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
