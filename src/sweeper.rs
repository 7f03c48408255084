//! Periodic storage cleanup for aged artifacts
//!
//! This module provides the background task that reclaims disk space by
//! deleting artifacts older than the retention window and dropping their
//! cache entries. Link-fallback deliveries stay valid exactly as long as
//! the artifact survives this sweep.
//!
//! # Features
//!
//! - Modification-time based retention
//! - Per-file failure isolation (one bad file never aborts the pass)
//! - Graceful shutdown handling
//!
//! # Example
//!
//! ```no_run
//! use media_dl::channel::NullChannel;
//! use media_dl::sweeper::CleanupSweeper;
//! use media_dl::{Config, MediaDownloader};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader =
//!     MediaDownloader::new(Config::default(), Arc::new(NullChannel::new())).await?;
//! let sweeper = CleanupSweeper::new(downloader.clone());
//!
//! // Run sweeper (loops until shutdown)
//! tokio::spawn(async move {
//!     sweeper.run().await;
//! });
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::Ordering;
use std::time::SystemTime;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::types::Event;
use crate::MediaDownloader;

/// Cleanup sweeper that periodically deletes aged artifacts from storage
///
/// Every `cleanup.sweep_interval_mins` the sweeper scans the storage
/// directory and deletes files whose modification time is older than
/// `cleanup.retention_hours`, removing matching cache entries as it goes.
pub struct CleanupSweeper {
    /// Engine handle for storage paths, the cache, and shutdown status
    engine: MediaDownloader,
}

impl CleanupSweeper {
    /// Creates a new cleanup sweeper
    pub fn new(engine: MediaDownloader) -> Self {
        Self { engine }
    }

    /// Starts the sweep loop
    ///
    /// Sleeps for one interval first (a just-started engine has nothing old
    /// enough to reclaim), then alternates sweep and sleep until the engine
    /// stops accepting work.
    pub async fn run(self) {
        info!("Cleanup sweeper started");

        loop {
            sleep(self.engine.get_config().sweep_interval()).await;

            // Check for shutdown signal via the engine's accepting_new flag
            if !self.engine.queue_state.accepting_new.load(Ordering::SeqCst) {
                info!("Cleanup sweeper shutting down");
                break;
            }

            self.sweep_once().await;
        }
    }

    /// One sweep pass over the storage directory
    ///
    /// Returns `(deleted, failed)` counts and emits `SweepCompleted` with
    /// the same numbers. Unreadable or undeletable entries are counted as
    /// failed and skipped; they get another chance next pass.
    pub(crate) async fn sweep_once(&self) -> (usize, usize) {
        let config = self.engine.get_config();
        let retention = config.retention();
        let storage_dir = config.storage_dir();

        let mut deleted = 0usize;
        let mut failed = 0usize;

        match tokio::fs::read_dir(storage_dir).await {
            Ok(mut entries) => loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read storage directory entry");
                        failed += 1;
                        break;
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to stat artifact");
                        failed += 1;
                        continue;
                    }
                };

                if !metadata.is_file() {
                    continue;
                }

                let modified = match metadata.modified() {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to read artifact modification time"
                        );
                        failed += 1;
                        continue;
                    }
                };

                // A future mtime reads as age zero and is left alone
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default();
                if age <= retention {
                    continue;
                }

                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        deleted += 1;
                        self.engine.cache.remove_by_artifact_path(&path).await;
                        debug!(
                            path = %path.display(),
                            age_secs = age.as_secs(),
                            "Deleted expired artifact"
                        );
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to delete expired artifact"
                        );
                    }
                }
            },
            Err(e) => {
                warn!(
                    path = %storage_dir.display(),
                    error = %e,
                    "Failed to read storage directory"
                );
                failed += 1;
            }
        }

        if deleted > 0 || failed > 0 {
            info!(deleted, failed, "Cleanup sweep finished");
        }
        self.engine.emit_event(Event::SweepCompleted { deleted, failed });

        (deleted, failed)
    }
}
