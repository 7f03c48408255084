//! Error types for media-dl
//!
//! Three layers live here: the library-wide [`Error`] enum and its
//! domain sub-enums, the closed [`FetchFailureKind`] taxonomy that the
//! retry executor, analytics, and user messaging all share, and the
//! [`ApiError`] JSON envelope the HTTP surface returns (with
//! [`ToHttpStatus`] deciding the status line).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library-wide error type
///
/// Everything fallible in the crate funnels into this enum. Fetch and
/// delivery failures carry their own sub-enums because the engine reacts
/// to them differently (user messaging, analytics classification).
#[derive(Debug, Error)]
pub enum Error {
    /// A setting failed validation
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the value
        message: String,
        /// Dotted path of the offending setting, e.g. "queue.concurrent_fetches"
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Raw sqlx error that escaped the DatabaseError wrappers
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Fetch-related error (tool failures, retries exhausted, integrity)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Delivery-related error (no usable path to the requester)
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Request denied by the per-requester admission gate
    #[error("rate limited: retry in {wait_secs}s")]
    RateLimited {
        /// Whole seconds until the requester may submit again (rounded up)
        wait_secs: u64,
    },

    /// Shutdown in progress, new submissions are refused
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API server error: {0}")]
    ApiServerError(String),

    /// External tool could not be executed (missing binary, spawn failure)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from the analytics database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Fetch-related errors produced by the retry executor
#[derive(Debug, Error)]
pub enum FetchError {
    /// All attempts failed; carries the classification of the final attempt
    #[error("fetch failed after {attempts} attempt(s): {kind}")]
    Exhausted {
        /// Classification of the last observed tool failure
        kind: FetchFailureKind,
        /// Number of subprocess invocations that were made
        attempts: u32,
    },

    /// The tool exited successfully but no artifact with the expected
    /// identifier prefix was found in storage
    #[error("artifact {artifact_id} missing after fetch")]
    ArtifactMissing {
        /// The artifact identifier the output template was built from
        artifact_id: String,
    },
}

/// Delivery-related errors
///
/// Produced when neither in-band transfer nor link fallback can reach the
/// requester. Always surfaced, never silently dropped.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Artifact exceeds the in-band ceiling and no public base URL is configured
    #[error("artifact of {size_bytes} bytes exceeds the {limit_bytes} byte transfer limit and no link fallback is configured")]
    TooLargeNoFallback {
        /// Size of the artifact that could not be delivered
        size_bytes: u64,
        /// The configured in-band size ceiling
        limit_bytes: u64,
    },

    /// In-band transfer was rejected by the channel and no public base URL is configured
    #[error("in-band transfer failed ({reason}) and no link fallback is configured")]
    SendFailedNoFallback {
        /// The channel's rejection reason
        reason: String,
    },
}

impl DeliveryError {
    /// User-facing explanation with a suggested action
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DeliveryError::TooLargeNoFallback { size_bytes, .. } => format!(
                "The file is too large to send here ({} MB) and no download link is available. \
                 Ask the operator to configure a public URL.",
                size_bytes / (1024 * 1024)
            ),
            DeliveryError::SendFailedNoFallback { .. } => {
                "Sending the file failed and no download link is available. \
                 Please try again later."
                    .to_string()
            }
        }
    }
}

/// Closed classification of fetch-tool failures
///
/// Produced by [`crate::fetch_tool::classify_stderr`] from the tool's
/// captured stderr. The substring rules live there; this enum is the
/// stable vocabulary the rest of the system (analytics, user messaging,
/// events) speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// Access denied or geo-restricted content (e.g. HTTP 403)
    Forbidden,
    /// Source no longer exists (e.g. HTTP 404, removed video)
    NotFound,
    /// The tool could not extract media from the page
    ExtractionFailed,
    /// Network-level failure (DNS, connection)
    Network,
    /// The tool reported a timeout
    Timeout,
    /// Unrecognized failure output
    Unknown,
}

impl FetchFailureKind {
    /// Machine-readable code, used in analytics rows and API payloads
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailureKind::Forbidden => "forbidden",
            FetchFailureKind::NotFound => "not_found",
            FetchFailureKind::ExtractionFailed => "extraction_failed",
            FetchFailureKind::Network => "network",
            FetchFailureKind::Timeout => "timeout",
            FetchFailureKind::Unknown => "unknown",
        }
    }

    /// User-facing explanation in plain language
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchFailureKind::Forbidden => {
                "This content is blocked or not available in the server's region."
            }
            FetchFailureKind::NotFound => {
                "The content could not be found. It may have been removed or the link is wrong."
            }
            FetchFailureKind::ExtractionFailed => {
                "Could not extract media from this link. The site may not be supported."
            }
            FetchFailureKind::Network => {
                "A network problem interrupted the download. Please try again later."
            }
            FetchFailureKind::Timeout => "The download timed out. Please try again later.",
            FetchFailureKind::Unknown => {
                "The download failed. Please check the link and try again."
            }
        }
    }
}

impl std::fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JSON envelope every API error response uses
///
/// Clients key off `error.code`; `error.message` mirrors the Rust
/// [`Error`]'s `Display` output and `error.details` carries structured
/// context where the variant has any:
///
/// ```json
/// {
///   "error": {
///     "code": "rate_limited",
///     "message": "rate limited: retry in 12s",
///     "details": {
///       "wait_secs": 12
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: ErrorDetail,
}

/// Body of an [`ApiError`]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable machine-readable code, e.g. "rate_limited"
    pub code: String,

    /// Human-readable description
    pub message: String,

    /// Structured context, omitted when a variant has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Shorthand for a "not_found" response naming the missing resource
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Maps domain errors onto the HTTP status line and the stable error code
/// clients dispatch on
pub trait ToHttpStatus {
    fn status_code(&self) -> u16;

    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // caller-side problems
            Error::Config { .. } => 400,
            Error::RateLimited { .. } => 429,

            // our side: ArtifactMissing is an integrity failure in our
            // storage, not the upstream's fault
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Fetch(FetchError::ArtifactMissing { .. }) => 500,
            Error::Other(_) => 500,

            // upstream fetch and channel delivery failures read as a
            // broken gateway to the source
            Error::Fetch(FetchError::Exhausted { .. }) => 502,
            Error::Delivery(_) => 502,

            // temporarily out of service
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Fetch(FetchError::Exhausted { .. }) => "fetch_failed",
            Error::Fetch(FetchError::ArtifactMissing { .. }) => "artifact_missing",
            Error::Delivery(DeliveryError::TooLargeNoFallback { .. }) => "delivery_too_large",
            Error::Delivery(DeliveryError::SendFailedNoFallback { .. }) => "delivery_failed",
            Error::RateLimited { .. } => "rate_limited",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Variants with structured context get a details object
        let details = match &error {
            Error::RateLimited { wait_secs } => Some(serde_json::json!({
                "wait_secs": wait_secs,
            })),
            Error::Fetch(FetchError::Exhausted { kind, attempts }) => Some(serde_json::json!({
                "kind": kind.as_str(),
                "attempts": attempts,
            })),
            Error::Fetch(FetchError::ArtifactMissing { artifact_id }) => Some(serde_json::json!({
                "artifact_id": artifact_id,
            })),
            Error::Delivery(DeliveryError::TooLargeNoFallback {
                size_bytes,
                limit_bytes,
            }) => Some(serde_json::json!({
                "size_bytes": size_bytes,
                "limit_bytes": limit_bytes,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// One row per reachable ToHttpStatus arm: (error, status, code).
    fn http_mapping_table() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("queue.concurrent_fetches".into()),
                },
                400,
                "config_error",
            ),
            (Error::RateLimited { wait_secs: 12 }, 429, "rate_limited"),
            (
                Error::Database(DatabaseError::QueryFailed("timeout".into())),
                500,
                "database_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (
                Error::Fetch(FetchError::ArtifactMissing {
                    artifact_id: "ab12".into(),
                }),
                500,
                "artifact_missing",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
            (
                Error::Fetch(FetchError::Exhausted {
                    kind: FetchFailureKind::Forbidden,
                    attempts: 3,
                }),
                502,
                "fetch_failed",
            ),
            (
                Error::Delivery(DeliveryError::TooLargeNoFallback {
                    size_bytes: 100_000_000,
                    limit_bytes: 50_000_000,
                }),
                502,
                "delivery_too_large",
            ),
            (
                Error::Delivery(DeliveryError::SendFailedNoFallback {
                    reason: "channel closed".into(),
                }),
                502,
                "delivery_failed",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::ExternalTool("yt-dlp not found".into()),
                503,
                "external_tool_error",
            ),
        ]
    }

    #[test]
    fn http_mapping_table_holds_for_status_and_code() {
        for (error, status, code) in http_mapping_table() {
            assert_eq!(error.status_code(), status, "wrong status for {code}");
            assert_eq!(error.error_code(), code, "wrong code for {error:?}");
        }
    }

    // The category boundaries below are the ones a refactor is most likely
    // to move by accident.

    #[test]
    fn config_errors_are_the_callers_fault() {
        let err = Error::Config {
            message: "bad".into(),
            key: None,
        };
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn rate_limited_is_429() {
        let err = Error::RateLimited { wait_secs: 5 };
        assert_eq!(err.status_code(), 429);
    }

    #[test]
    fn exhausted_fetch_reads_as_bad_gateway() {
        let err = Error::Fetch(FetchError::Exhausted {
            kind: FetchFailureKind::Network,
            attempts: 3,
        });
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn artifact_missing_is_our_fault_not_upstreams() {
        let err = Error::Fetch(FetchError::ArtifactMissing {
            artifact_id: "deadbeef".into(),
        });
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn shutdown_reads_as_service_unavailable() {
        assert_eq!(Error::ShuttingDown.status_code(), 503);
    }

    #[test]
    fn failure_kind_codes_are_stable() {
        let expected = [
            (FetchFailureKind::Forbidden, "forbidden"),
            (FetchFailureKind::NotFound, "not_found"),
            (FetchFailureKind::ExtractionFailed, "extraction_failed"),
            (FetchFailureKind::Network, "network"),
            (FetchFailureKind::Timeout, "timeout"),
            (FetchFailureKind::Unknown, "unknown"),
        ];
        for (kind, code) in expected {
            assert_eq!(kind.as_str(), code, "analytics rows depend on this code");
            assert_eq!(kind.to_string(), code, "Display must match as_str");
        }
    }

    #[test]
    fn failure_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&FetchFailureKind::ExtractionFailed).unwrap();
        assert_eq!(json, "\"extraction_failed\"");

        let back: FetchFailureKind = serde_json::from_str("\"forbidden\"").unwrap();
        assert_eq!(back, FetchFailureKind::Forbidden);
    }

    #[test]
    fn every_failure_kind_has_a_distinct_user_message() {
        let kinds = [
            FetchFailureKind::Forbidden,
            FetchFailureKind::NotFound,
            FetchFailureKind::ExtractionFailed,
            FetchFailureKind::Network,
            FetchFailureKind::Timeout,
            FetchFailureKind::Unknown,
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            let msg = kind.user_message();
            assert!(!msg.is_empty());
            assert!(
                seen.insert(msg),
                "user message for {kind:?} duplicates another kind"
            );
        }
    }

    #[test]
    fn delivery_too_large_user_message_reports_megabytes() {
        let err = DeliveryError::TooLargeNoFallback {
            size_bytes: 120 * 1024 * 1024,
            limit_bytes: 50 * 1024 * 1024,
        };
        assert!(
            err.user_message().contains("120 MB"),
            "message should contain the artifact size in MB: {}",
            err.user_message()
        );
    }

    // Error -> ApiError conversion

    #[test]
    fn api_error_from_rate_limited_has_wait_secs() {
        let err = Error::RateLimited { wait_secs: 17 };
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "rate_limited");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["wait_secs"], 17);
    }

    #[test]
    fn api_error_from_exhausted_fetch_has_kind_and_attempts() {
        let err = Error::Fetch(FetchError::Exhausted {
            kind: FetchFailureKind::Timeout,
            attempts: 3,
        });
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "fetch_failed");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["kind"], "timeout");
        assert_eq!(details["attempts"], 3);
    }

    #[test]
    fn api_error_from_too_large_has_byte_counts() {
        let err = Error::Delivery(DeliveryError::TooLargeNoFallback {
            size_bytes: 99,
            limit_bytes: 50,
        });
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "delivery_too_large");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["size_bytes"], 99);
        assert_eq!(details["limit_bytes"], 50);
    }

    #[test]
    fn variants_without_structured_context_get_no_details_object() {
        let plain: Vec<(Error, &str)> = vec![
            (Error::ShuttingDown, "shutting_down"),
            (
                Error::Config {
                    message: "invalid port".into(),
                    key: Some("server.port".into()),
                },
                "config_error",
            ),
            (Error::Other("boom".into()), "internal_error"),
        ];
        for (err, code) in plain {
            let api: ApiError = err.into();
            assert_eq!(api.error.code, code);
            assert!(api.error.details.is_none(), "{code} should carry no details");
        }
    }

    #[test]
    fn api_error_message_matches_error_display() {
        let err = Error::Fetch(FetchError::Exhausted {
            kind: FetchFailureKind::NotFound,
            attempts: 2,
        });
        let display_msg = err.to_string();
        let api: ApiError = err.into();

        assert_eq!(
            api.error.message, display_msg,
            "ApiError message should match the Error's Display output"
        );
    }

    // ApiError factories and JSON shape

    #[test]
    fn factory_constructors_use_their_fixed_codes() {
        let not_found = ApiError::not_found("Artifact abc123");
        assert_eq!(not_found.error.code, "not_found");
        assert_eq!(not_found.error.message, "Artifact abc123 not found");

        let internal = ApiError::internal("unexpected failure");
        assert_eq!(internal.error.code, "internal_error");
        assert_eq!(internal.error.message, "unexpected failure");

        let unavailable = ApiError::service_unavailable("shutting down");
        assert_eq!(unavailable.error.code, "service_unavailable");
        assert!(unavailable.error.details.is_none());
    }

    #[test]
    fn serialized_json_drops_the_details_key_when_none() {
        let api = ApiError::new("test_code", "test message");

        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&api).unwrap()).unwrap();

        assert_eq!(parsed["error"]["code"], "test_code");
        assert_eq!(parsed["error"]["message"], "test message");
        assert!(
            parsed["error"].get("details").is_none(),
            "a null details key would break clients that treat its presence as meaningful"
        );
    }

    #[test]
    fn wire_format_parses_back_into_api_error() {
        let body = r#"{
            "error": {
                "code": "rate_limited",
                "message": "rate limited: retry in 9s",
                "details": {"wait_secs": 9}
            }
        }"#;

        let api: ApiError = serde_json::from_str(body).unwrap();
        assert_eq!(api.error.code, "rate_limited");
        assert_eq!(api.error.details.unwrap()["wait_secs"], 9);
    }
}
