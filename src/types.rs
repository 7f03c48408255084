//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::error::FetchFailureKind;

/// Unique identifier for a fetch job
///
/// Assigned from a process-local counter when a request is accepted.
/// Not persisted; a restart starts over from 1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw numeric identifier
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for JobId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<JobId> for i64 {
    fn eq(&self, other: &JobId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Opaque requester identity, as supplied by the message channel
///
/// The engine never interprets this beyond equality; a Telegram front end
/// would put the chat id here, an IRC one the nick, and so on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    /// Create a new RequesterId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequesterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequesterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable cache key derived from a normalized source URL
///
/// Produced by [`crate::fingerprint::fingerprint`]; 64 lowercase hex
/// characters (SHA-256).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Get the inner hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin label identifying which known source site a URL belongs to
///
/// Produced by the source classifier. `Unknown` covers link-like text that
/// matched no known-origin pattern; such links are still fetched (the tool
/// supports far more sites than the engine labels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// tiktok.com, vm.tiktok.com, vt.tiktok.com
    Tiktok,
    /// youtube.com, youtu.be
    Youtube,
    /// instagram.com
    Instagram,
    /// twitter.com, x.com
    Twitter,
    /// reddit.com
    Reddit,
    /// facebook.com, fb.watch
    Facebook,
    /// twitch.tv
    Twitch,
    /// vimeo.com
    Vimeo,
    /// Link-like text that matched no known origin
    Unknown,
}

impl Origin {
    /// Label used in analytics rows and events
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Tiktok => "tiktok",
            Origin::Youtube => "youtube",
            Origin::Instagram => "instagram",
            Origin::Twitter => "twitter",
            Origin::Reddit => "reddit",
            Origin::Facebook => "facebook",
            Origin::Twitch => "twitch",
            Origin::Vimeo => "vimeo",
            Origin::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An accepted fetch request, as produced by classification and admission
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// The extracted source URL
    pub source_url: String,
    /// Who asked
    pub requester_id: RequesterId,
    /// Origin label computed at classification time
    pub origin: Origin,
    /// The inbound message this request came from, for threading replies
    pub message_id: i64,
    /// When the request passed the rate gate
    pub submitted_at: DateTime<Utc>,
}

/// How an artifact reached the requester
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Sent directly through the message channel
    InBand,
    /// A public link was sent instead
    Link,
}

impl DeliveryMode {
    /// Stable lowercase name for logs and events
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::InBand => "inband",
            DeliveryMode::Link => "link",
        }
    }
}

/// A cached artifact record
///
/// Holds a non-owning path reference; the file itself may vanish out from
/// under the entry, which the cache heals on next lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key (stable hash of the normalized source URL)
    pub fingerprint: Fingerprint,
    /// Where the artifact lives in storage
    pub artifact_path: PathBuf,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// When the artifact was fetched; drives capacity eviction
    pub created_at: DateTime<Utc>,
}

/// Event emitted during the fetch-job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and placed in the FIFO queue
    Queued {
        /// Job ID
        id: JobId,
        /// The source URL to fetch
        url: String,
        /// Origin label
        origin: Origin,
    },

    /// Job picked up by a queue slot
    Started {
        /// Job ID
        id: JobId,
    },

    /// Job served from the artifact cache without spawning the tool
    CacheHit {
        /// Job ID
        id: JobId,
        /// The fingerprint that hit
        fingerprint: Fingerprint,
    },

    /// Fetch progress update (at roughly 20-point boundaries)
    Progress {
        /// Job ID
        id: JobId,
        /// Percent complete, 0.0 through 100.0
        percent: f32,
    },

    /// Attempt failed; backing off before the next one
    Retrying {
        /// Job ID
        id: JobId,
        /// The attempt that just failed (1-based)
        attempt: u32,
        /// Backoff delay before the next attempt
        delay_secs: u64,
    },

    /// Fetch reached a terminal success
    FetchSucceeded {
        /// Job ID
        id: JobId,
        /// Artifact size in bytes
        size_bytes: u64,
        /// Wall-clock job duration in milliseconds
        duration_ms: u64,
        /// Whether the artifact came from the cache
        cache_hit: bool,
    },

    /// Fetch reached a terminal failure
    FetchFailed {
        /// Job ID
        id: JobId,
        /// Classified failure reason
        kind: FetchFailureKind,
        /// Number of attempts made (0 for failures before the first spawn)
        attempts: u32,
    },

    /// Artifact handed to the requester
    Delivered {
        /// Job ID
        id: JobId,
        /// In-band or link
        mode: DeliveryMode,
    },

    /// No delivery path reached the requester
    DeliveryFailed {
        /// Job ID
        id: JobId,
        /// Description of why
        error: String,
    },

    /// A request was denied by the admission gate
    RateLimited {
        /// The throttled requester
        requester_id: RequesterId,
        /// Whole seconds until the requester may retry
        wait_secs: u64,
    },

    /// A cleanup sweep finished
    SweepCompleted {
        /// Files deleted this sweep
        deleted: usize,
        /// Files that could not be deleted or statted
        failed: usize,
    },

    /// Forwarding an outcome to the analytics webhook failed
    AnalyticsWebhookFailed {
        url: String,
        error: String,
    },

    /// The embedded API server is listening
    ApiServerStarted {
        /// Bound socket address
        addr: String,
    },

    /// Graceful shutdown initiated; no new jobs accepted
    ShutdownStarted,

    /// Graceful shutdown finished
    Shutdown,
}

/// One analytics record per completed job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outcome {
    /// Who asked
    pub requester_id: RequesterId,
    /// The source URL
    pub url: String,
    /// Cache key of the URL
    pub fingerprint: Fingerprint,
    /// Origin label
    pub origin: Origin,
    /// Whether the job produced (or reused) an artifact
    pub success: bool,
    /// Failure classification, for unsuccessful jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FetchFailureKind>,
    /// Artifact size, when one was produced or reused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Wall-clock job duration in milliseconds
    pub duration_ms: u64,
    /// Whether the artifact came from the cache
    pub cache_hit: bool,
}

/// Queue observability counters
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    /// Jobs waiting for a slot
    pub pending: usize,

    /// Jobs currently holding a slot
    pub active: usize,

    /// Whether the queue is accepting new jobs
    pub accepting_new: bool,
}

/// Aggregate counters from the analytics log
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OutcomeTotals {
    /// All recorded jobs
    pub total: i64,

    /// Jobs that delivered an artifact
    pub succeeded: i64,

    /// Jobs that ended in failure
    pub failed: i64,

    /// Jobs served from the cache
    pub cache_hits: i64,
}

/// Snapshot of engine state for the stats surface
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineStats {
    /// Queue counters
    pub queue: QueueStats,

    /// Entries currently in the artifact cache
    pub cache_entries: usize,

    /// Seconds since the engine was constructed
    pub uptime_secs: u64,

    /// Aggregate job totals from the analytics log
    pub totals: OutcomeTotals,
}
