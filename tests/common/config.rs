//! Test configuration helpers for creating engines against temp storage

use std::path::Path;
use std::sync::Arc;

use media_dl::channel::MessageChannel;
use media_dl::{Config, MediaDownloader};

/// Base configuration rooted in a temp directory
///
/// Storage and the analytics database live under `root`; the embedded HTTP
/// server stays disabled and rate limiting is off so tests can submit
/// back to back.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.storage_dir = root.join("artifacts");
    config.analytics.database_path = root.join("analytics.db");
    config.queue.concurrent_fetches = 2;
    config.rate_limit.min_interval_secs = 0;
    config
}

/// Construct an engine through the public constructor and start its
/// background tasks
pub async fn create_engine(config: Config, channel: Arc<dyn MessageChannel>) -> MediaDownloader {
    let engine = MediaDownloader::new(config, channel)
        .await
        .expect("engine construction failed");
    engine.start().await.expect("engine start failed");
    engine
}
