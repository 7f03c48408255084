//! Shared state for API handlers

use crate::engine::MediaDownloader;

/// State shared across all API route handlers.
///
/// The engine handle is cheap to clone; every field it carries is behind
/// an `Arc`, so handlers get their own copy per request.
#[derive(Clone)]
pub struct AppState {
    /// Engine handle for stats, events, and configuration
    pub engine: MediaDownloader,
}

impl AppState {
    /// Create new application state from an engine handle
    pub fn new(engine: MediaDownloader) -> Self {
        Self { engine }
    }
}
