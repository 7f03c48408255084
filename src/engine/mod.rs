//! Core engine implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`submit`] - Inbound message handling and queue admission
//! - [`queue_processor`] - FIFO queue processing and job spawning
//! - [`fetch_task`] - Per-job fetch execution with retry
//! - [`delivery`] - Delivery policy (in-band transfer vs. link fallback)
//! - [`lifecycle`] - Engine start, API server spawn, graceful shutdown
//! - [`services`] - Background service starters and analytics recording
//! - [`webhooks`] - Analytics webhook forwarding

mod delivery;
mod fetch_task;
mod lifecycle;
mod queue_processor;
mod services;
mod submit;
mod webhooks;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::cache::ArtifactCache;
use crate::channel::{MessageChannel, MessageRef};
use crate::classifier::SourceClassifier;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetch_tool::FetchTool;
use crate::rate_limit::RateLimiter;
use crate::types::{FetchRequest, JobId, QueueStats};

/// Queue and job state management
#[derive(Clone)]
pub(crate) struct QueueState {
    /// FIFO queue of accepted jobs waiting for a slot (protected by Mutex)
    pub(crate) queue:
        std::sync::Arc<tokio::sync::Mutex<std::collections::VecDeque<QueuedJob>>>,
    /// Semaphore to limit concurrent fetch subprocesses (respects queue.concurrent_fetches config)
    pub(crate) concurrent_limit: std::sync::Arc<tokio::sync::Semaphore>,
    /// Map of active jobs to their fingerprints (for drain tracking and observability)
    pub(crate) active_jobs: std::sync::Arc<
        tokio::sync::Mutex<std::collections::HashMap<JobId, crate::types::Fingerprint>>,
    >,
    /// Flag to indicate whether new requests are accepted (set to false during shutdown)
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// The engine. Cloning is cheap; every field is shared behind an Arc, so
/// background tasks each hold their own handle.
#[derive(Clone)]
pub struct MediaDownloader {
    /// Analytics database. Public so embedders and integration tests can
    /// query recorded outcomes directly.
    pub db: std::sync::Arc<Database>,
    /// Broadcast side of the event stream
    pub(crate) event_tx: tokio::sync::broadcast::Sender<crate::types::Event>,
    pub(crate) config: std::sync::Arc<Config>,
    /// Reply channel back to requesters (trait object for pluggable front ends)
    pub(crate) channel: std::sync::Arc<dyn MessageChannel>,
    /// Source classifier with compiled origin patterns
    pub(crate) classifier: std::sync::Arc<SourceClassifier>,
    /// Per-requester admission gate
    pub(crate) rate_limiter: std::sync::Arc<RateLimiter>,
    /// In-memory artifact cache keyed by URL fingerprint
    pub(crate) cache: std::sync::Arc<ArtifactCache>,
    /// External fetch tool wrapper (yt-dlp subprocess)
    pub(crate) fetch_tool: std::sync::Arc<FetchTool>,
    /// Queue and job state management
    pub(crate) queue_state: QueueState,
    /// Counter for assigning job IDs
    pub(crate) next_job_id: std::sync::Arc<std::sync::atomic::AtomicI64>,
    /// When the engine was constructed, for uptime reporting
    pub(crate) started_at: std::time::Instant,
    /// Pre-bound API listener, taken by `start()` when the server is enabled
    pub(crate) api_listener:
        std::sync::Arc<tokio::sync::Mutex<Option<tokio::net::TcpListener>>>,
}

/// Internal struct representing an accepted job in the FIFO queue
#[derive(Debug, Clone)]
pub(crate) struct QueuedJob {
    pub(crate) id: JobId,
    pub(crate) request: FetchRequest,
    /// The acknowledgment message sent at admission, edited with progress and results
    pub(crate) ack: Option<MessageRef>,
}

impl MediaDownloader {
    /// Construct an engine from a validated configuration.
    ///
    /// Besides wiring the components together this creates the storage
    /// directory, opens and migrates the analytics database, probes the
    /// fetch tool (a missing tool logs a warning, it does not abort), and
    /// binds the API listener when the server is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the storage directory
    /// cannot be created, the database cannot be opened, or the API listener
    /// cannot bind its configured address.
    pub async fn new(
        config: Config,
        channel: std::sync::Arc<dyn MessageChannel>,
    ) -> Result<Self> {
        config.validate()?;

        // Ensure the storage directory exists
        tokio::fs::create_dir_all(config.storage_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create storage directory '{}': {}",
                        config.storage_dir().display(),
                        e
                    ),
                ))
            })?;

        // Initialize the analytics database
        let db = Database::new(&config.analytics.database_path).await?;

        // 1000 buffered events per subscriber before a slow one starts lagging
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let classifier = SourceClassifier::new()?;

        // Probe the fetch tool; jobs fail fast later if it is missing
        let fetch_tool = FetchTool::new(&config.fetch_tool);
        match fetch_tool.probe_version().await {
            Ok(version) => {
                tracing::info!(
                    binary = %fetch_tool.binary().display(),
                    version = %version,
                    "Fetch tool available"
                );
            }
            Err(e) => {
                tracing::warn!(
                    binary = %fetch_tool.binary().display(),
                    error = %e,
                    "Fetch tool not found; install yt-dlp or set fetch_tool.binary_path"
                );
            }
        }

        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        let cache = ArtifactCache::new(config.cache.capacity);

        // Bind the API listener up front so a bad address fails construction,
        // not a background task
        let api_listener = if config.server.enabled {
            let addr = config.server_addr()?;
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                Error::ApiServerError(format!("Failed to bind API server to {}: {}", addr, e))
            })?;
            Some(listener)
        } else {
            None
        };

        let queue_state = QueueState {
            queue: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::VecDeque::new(),
            )),
            concurrent_limit: std::sync::Arc::new(tokio::sync::Semaphore::new(
                config.queue.concurrent_fetches,
            )),
            active_jobs: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::HashMap::new(),
            )),
            accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        };

        Ok(Self {
            db: std::sync::Arc::new(db),
            event_tx,
            config: std::sync::Arc::new(config),
            channel,
            classifier: std::sync::Arc::new(classifier),
            rate_limiter: std::sync::Arc::new(rate_limiter),
            cache: std::sync::Arc::new(cache),
            fetch_tool: std::sync::Arc::new(fetch_tool),
            queue_state,
            next_job_id: std::sync::Arc::new(std::sync::atomic::AtomicI64::new(1)),
            started_at: std::time::Instant::now(),
            api_listener: std::sync::Arc::new(tokio::sync::Mutex::new(api_listener)),
        })
    }

    /// Subscribe to the engine's event stream.
    ///
    /// Every subscriber sees every event. A subscriber that falls more than
    /// 1000 events behind gets a `RecvError::Lagged` telling it how many it
    /// missed, then resumes from the live edge.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::channel::NullChannel;
    /// use media_dl::{Config, MediaDownloader};
    /// use std::sync::Arc;
    ///
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// let downloader =
    ///     MediaDownloader::new(Config::default(), Arc::new(NullChannel::new())).await?;
    ///
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "engine event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::types::Event> {
        self.event_tx.subscribe()
    }

    /// Shared handle to the engine's configuration
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// Snapshot of queue counters
    pub async fn queue_stats(&self) -> QueueStats {
        let pending = self.queue_state.queue.lock().await.len();
        let active = self.queue_state.active_jobs.lock().await.len();
        QueueStats {
            pending,
            active,
            accepting_new: self
                .queue_state
                .accepting_new
                .load(std::sync::atomic::Ordering::SeqCst),
        }
    }

    /// Snapshot of engine state for the stats surface
    ///
    /// # Errors
    ///
    /// Returns an error if querying the analytics totals fails.
    pub async fn engine_stats(&self) -> Result<crate::types::EngineStats> {
        let queue = self.queue_stats().await;
        let cache_entries = self.cache.len().await;
        let totals = self.db.outcome_totals().await?;

        Ok(crate::types::EngineStats {
            queue,
            cache_entries,
            uptime_secs: self.started_at.elapsed().as_secs(),
            totals,
        })
    }

    /// Seconds since the engine was constructed
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Broadcast an event. Best effort: with no subscribers the event is
    /// dropped and job processing carries on.
    pub(crate) fn emit_event(&self, event: crate::types::Event) {
        self.event_tx.send(event).ok();
    }

    /// Allocate the next job ID
    pub(crate) fn allocate_job_id(&self) -> JobId {
        JobId::new(
            self.next_job_id
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst),
        )
    }
}
