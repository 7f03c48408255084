//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use url::Url;
use utoipa::ToSchema;

/// Artifact storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Directory where fetched artifacts are written (default: "./downloads")
    ///
    /// Created recursively at engine construction if absent. The cleanup
    /// sweeper and the static `/artifacts` route both operate on this
    /// directory, so it must not be shared with unrelated files.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
        }
    }
}

/// Fetch queue configuration: how many subprocesses may run at once and
/// how long shutdown waits for active jobs
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueConfig {
    /// Maximum concurrent fetch subprocesses (default: 2)
    ///
    /// Jobs beyond this limit wait in submission order. Cache hits bypass
    /// the limit entirely since they spawn no subprocess.
    #[serde(default = "default_concurrent_fetches")]
    pub concurrent_fetches: usize,

    /// Seconds to wait for active jobs to finish during shutdown (default: 30)
    ///
    /// Jobs still active when this elapses are abandoned; their subprocesses
    /// are not killed.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrent_fetches: default_concurrent_fetches(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Per-requester rate limiting, the admission gate that throttles repeat
/// requesters
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitConfig {
    /// Minimum seconds between accepted requests from one requester (default: 30)
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Table size above which a garbage-collection pass runs (default: 1000)
    ///
    /// The pass removes requesters inactive longer than
    /// `inactivity_horizon_secs`. Best-effort memory bound, not a
    /// correctness requirement.
    #[serde(default = "default_gc_threshold")]
    pub gc_threshold: usize,

    /// Seconds of inactivity after which a requester entry is collectable (default: 3600)
    #[serde(default = "default_inactivity_horizon_secs")]
    pub inactivity_horizon_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            gc_threshold: default_gc_threshold(),
            inactivity_horizon_secs: default_inactivity_horizon_secs(),
        }
    }
}

/// Retry configuration for failed fetch attempts
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum fetch tool invocations per job (default: 3)
    ///
    /// Backoff between attempts is 2^attempt seconds (attempt = 1, 2, ...).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Artifact cache configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CacheConfig {
    /// Maximum number of cache entries (default: 100)
    ///
    /// When an insertion pushes the table past this bound, the entry with
    /// the oldest creation time is evicted. Creation age, not last access,
    /// drives retention.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Retention sweep configuration, the periodic task that reclaims disk
/// space by deleting aged artifacts
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupConfig {
    /// Whether the periodic sweep runs at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hours an artifact may age before the sweep deletes it (default: 24)
    ///
    /// Measured from file modification time. Link-fallback deliveries stay
    /// valid until this window expires.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Minutes between sweep passes (default: 60)
    #[serde(default = "default_sweep_interval_mins")]
    pub sweep_interval_mins: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_hours: default_retention_hours(),
            sweep_interval_mins: default_sweep_interval_mins(),
        }
    }
}

/// Delivery policy: when an artifact travels in-band through the message
/// channel and when the requester gets a download link instead
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryConfig {
    /// Largest artifact the message channel will carry in-band, in bytes (default: 50 MB)
    ///
    /// Larger artifacts fall back to a public link when `public_base_url`
    /// is configured, and fail delivery otherwise.
    #[serde(default = "default_inband_size_limit")]
    pub inband_size_limit_bytes: u64,

    /// Public base address for link fallback, e.g. "https://dl.example.com"
    ///
    /// Links take the form `<base>/artifacts/<file>`. When unset, oversized
    /// artifacts cannot be delivered and the requester receives an error.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            inband_size_limit_bytes: default_inband_size_limit(),
            public_base_url: None,
        }
    }
}

/// yt-dlp subprocess configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct FetchToolConfig {
    /// Path to the yt-dlp executable (auto-detected on PATH if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Embedded HTTP server configuration: the optional axum surface exposing
/// health, stats, events, and artifact serving
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// Whether the HTTP server starts with the engine (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Bind host (default: "127.0.0.1")
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Bind port (default: 3000)
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Allowed CORS origins (default: empty = permissive)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_server_host(),
            port: default_server_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Analytics configuration (outcome log and webhook forwarding)
///
/// All analytics writes are best-effort; failures never affect delivery
/// to the requester.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsConfig {
    /// SQLite database path for the outcome log (default: "media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Optional URL each outcome is POSTed to as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Timeout for webhook delivery in seconds (default: 10)
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
///
/// Fields are organized into logical sub-configs, each nesting under its
/// own key in the serialized form:
/// - [`storage`](StorageConfig): artifact directory
/// - [`queue`](QueueConfig): concurrency and shutdown drain
/// - [`rate_limit`](RateLimitConfig): per-requester admission gate
/// - [`retry`](RetryConfig): fetch attempt bound
/// - [`cache`](CacheConfig): artifact cache capacity
/// - [`cleanup`](CleanupConfig): retention sweep
/// - [`delivery`](DeliveryConfig): in-band vs. link fallback
/// - [`fetch_tool`](FetchToolConfig): yt-dlp binary and arguments
/// - [`server`](ServerConfig): embedded HTTP server
/// - [`analytics`](AnalyticsConfig): outcome log and webhook
///
/// Every field has a serde default, so `Config::default()` and
/// deserializing `{}` produce the same working configuration. Call
/// [`validate`](Config::validate) before handing the config to the engine;
/// engine construction does the same and rejects invalid values.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Artifact storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Queue concurrency and shutdown settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Per-requester rate limiting settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Fetch retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Artifact cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Storage cleanup settings
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Delivery policy settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// External fetch tool settings
    #[serde(default)]
    pub fetch_tool: FetchToolConfig,

    /// Embedded HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Analytics settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

// Convenience accessors: duration-typed views over the raw integer fields,
// so call sites don't repeat Duration::from_secs conversions.
impl Config {
    /// Artifact storage directory
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage.storage_dir
    }

    /// Minimum interval between accepted requests from one requester
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit.min_interval_secs)
    }

    /// Inactivity horizon for rate-limit garbage collection
    pub fn inactivity_horizon(&self) -> Duration {
        Duration::from_secs(self.rate_limit.inactivity_horizon_secs)
    }

    /// Artifact retention window
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.cleanup.retention_hours * 3600)
    }

    /// Interval between cleanup sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.sweep_interval_mins * 60)
    }

    /// Shutdown drain timeout
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.queue.shutdown_timeout_secs)
    }

    /// Analytics webhook delivery timeout
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.analytics.webhook_timeout_secs)
    }

    /// Socket address the HTTP server binds to
    pub fn server_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config {
                message: format!("invalid server address: {e}"),
                key: Some("server.host".to_string()),
            })
    }

    /// Check cross-field requirements
    ///
    /// Returns the first violation found as [`Error::Config`] with the
    /// offending key. Called by engine construction; embedders may also
    /// call it directly to fail fast on user-supplied configuration.
    pub fn validate(&self) -> Result<()> {
        if self.queue.concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "concurrent_fetches must be at least 1".to_string(),
                key: Some("queue.concurrent_fetches".to_string()),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }

        if self.cache.capacity == 0 {
            return Err(Error::Config {
                message: "cache capacity must be at least 1".to_string(),
                key: Some("cache.capacity".to_string()),
            });
        }

        if self.cleanup.retention_hours == 0 {
            return Err(Error::Config {
                message: "retention_hours must be at least 1".to_string(),
                key: Some("cleanup.retention_hours".to_string()),
            });
        }

        if self.cleanup.sweep_interval_mins == 0 {
            return Err(Error::Config {
                message: "sweep_interval_mins must be at least 1".to_string(),
                key: Some("cleanup.sweep_interval_mins".to_string()),
            });
        }

        if let Some(base) = &self.delivery.public_base_url {
            Url::parse(base).map_err(|e| Error::Config {
                message: format!("public_base_url is not a valid URL: {e}"),
                key: Some("delivery.public_base_url".to_string()),
            })?;
        }

        if self.server.enabled && self.server.port == 0 {
            return Err(Error::Config {
                message: "server port must be nonzero when the server is enabled".to_string(),
                key: Some("server.port".to_string()),
            });
        }

        Ok(())
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_concurrent_fetches() -> usize {
    2
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_min_interval_secs() -> u64 {
    30
}

fn default_gc_threshold() -> usize {
    1000
}

fn default_inactivity_horizon_secs() -> u64 {
    3600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cache_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_retention_hours() -> u64 {
    24
}

fn default_sweep_interval_mins() -> u64 {
    60
}

fn default_inband_size_limit() -> u64 {
    50 * 1024 * 1024 // 50 MB
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("media-dl.db")
}

fn default_webhook_timeout_secs() -> u64 {
    10
}
