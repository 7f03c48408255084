//! OpenAPI documentation generation using utoipa
//!
//! Generates the OpenAPI 3.0 specification for the REST API. The spec is
//! served at `/openapi.json` and rendered interactively at `/docs`.

use utoipa::OpenApi;

/// Root OpenAPI document for the monitoring surface
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Monitoring surface for the media retrieval engine: health, \
                       statistics, a live event stream, and artifact downloads for \
                       link-mode deliveries."
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        crate::api::routes::health_check,
        crate::api::routes::engine_stats,
        crate::api::routes::event_stream,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::Origin,
        crate::types::QueueStats,
        crate::types::OutcomeTotals,
        crate::types::EngineStats,
        crate::error::FetchFailureKind,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "system", description = "Health, statistics, and event streaming")
    )
)]
pub struct ApiDoc;
