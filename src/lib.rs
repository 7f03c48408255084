//! # media-dl
//!
//! Backend library for chat-driven media retrieval services.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Channel-agnostic** - Delivery goes through the [`channel::MessageChannel`]
//!   trait, so any chat platform can sit in front of the engine
//! - **Zero-config friendly** - `Config::default()` is a working setup
//! - **Embeddable** - A plain library crate; the host process owns the
//!   runtime, the transport, and the lifecycle
//! - **Observable** - Every lifecycle step is broadcast as an [`Event`],
//!   and an optional HTTP surface exposes health, stats, and a live stream
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_dl::channel::NullChannel;
//! use media_dl::types::RequesterId;
//! use media_dl::{Config, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let engine = MediaDownloader::new(config, Arc::new(NullChannel::new())).await?;
//!     engine.start().await?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Hand inbound chat messages to the engine; messages without a
//!     // supported media link are ignored
//!     engine
//!         .handle_message(
//!             "look at this https://youtu.be/dQw4w9WgXcQ",
//!             RequesterId::new("chat-42"),
//!             7,
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Embedded HTTP server: health, stats, events, docs, artifact serving
pub mod api;
/// Fingerprint-keyed artifact cache
pub mod cache;
/// Message channel abstraction for delivery
pub mod channel;
/// Link extraction and origin classification
pub mod classifier;
/// Configuration sections and validation
pub mod config;
/// SQLite analytics log
pub mod db;
/// Core engine implementation (decomposed into focused submodules)
pub mod engine;
/// Error taxonomy and HTTP mappings
pub mod error;
/// yt-dlp subprocess driver
pub mod fetch_tool;
/// URL normalization and cache-key hashing
pub mod fingerprint;
/// Per-requester admission throttling
pub mod rate_limit;
/// Periodic artifact retention sweeps
pub mod sweeper;
/// Identifiers, events, and shared records
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use engine::MediaDownloader;
pub use channel::{ChannelError, MessageChannel};
pub use error::{ApiError, Error, ErrorDetail, FetchFailureKind, Result, ToHttpStatus};
pub use types::{
    CacheEntry, DeliveryMode, EngineStats, Event, Fingerprint, JobId, Origin, Outcome,
    OutcomeTotals, QueueStats, RequesterId,
};

/// Block until the process receives a termination signal, then shut the
/// engine down gracefully.
///
/// On Unix this waits for SIGTERM or SIGINT; elsewhere it waits for Ctrl+C.
/// Active jobs get the configured drain window before stragglers are
/// abandoned (see [`MediaDownloader::shutdown`]).
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_dl::channel::NullChannel;
/// use media_dl::{run_with_shutdown, Config, MediaDownloader};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let engine = MediaDownloader::new(config, Arc::new(NullChannel::new())).await?;
///     engine.start().await?;
///
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    engine.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; ctrl_c still works
    // there and covers the SIGINT half.
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => {
            tokio::select! {
                _ = term.recv() => tracing::info!("SIGTERM received, shutting down"),
                _ = int.recv() => tracing::info!("SIGINT received, shutting down"),
            }
        }
        (term, int) => {
            if let Err(e) = &term {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
            }
            if let Err(e) = &int {
                tracing::warn!(error = %e, "SIGINT handler unavailable");
            }
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Interrupt received, shutting down");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Ctrl+C received, shutting down");
}
