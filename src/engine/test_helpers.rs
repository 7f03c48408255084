//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::cache::ArtifactCache;
use crate::channel::{ChannelError, MessageChannel, MessageRef, NullChannel};
use crate::classifier::SourceClassifier;
use crate::config::Config;
use crate::db::Database;
use crate::engine::{MediaDownloader, QueueState};
use crate::fetch_tool::FetchTool;
use crate::rate_limit::RateLimiter;
use crate::types::RequesterId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Base test configuration pointing all paths into `root`.
///
/// The rate gate is opened (zero interval) so tests submit freely; tests
/// that exercise the gate set their own interval.
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.storage_dir = root.join("artifacts");
    config.analytics.database_path = root.join("test.db");
    config.queue.concurrent_fetches = 2;
    config.rate_limit.min_interval_secs = 0;
    config
}

/// Assemble a MediaDownloader directly from parts, skipping the fetch tool
/// probe and the API listener bind that `new` performs.
pub(crate) async fn build_test_engine(
    config: Config,
    channel: Arc<dyn MessageChannel>,
) -> MediaDownloader {
    std::fs::create_dir_all(config.storage_dir()).unwrap();

    let db = Database::new(&config.analytics.database_path).await.unwrap();
    let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

    let classifier = SourceClassifier::new().unwrap();
    let fetch_tool = FetchTool::new(&config.fetch_tool);
    let rate_limiter = RateLimiter::new(config.rate_limit.clone());
    let cache = ArtifactCache::new(config.cache.capacity);

    let queue_state = QueueState {
        queue: Arc::new(tokio::sync::Mutex::new(std::collections::VecDeque::new())),
        concurrent_limit: Arc::new(tokio::sync::Semaphore::new(config.queue.concurrent_fetches)),
        active_jobs: Arc::new(tokio::sync::Mutex::new(std::collections::HashMap::new())),
        accepting_new: Arc::new(AtomicBool::new(true)),
    };

    MediaDownloader {
        db: Arc::new(db),
        event_tx,
        config: Arc::new(config),
        channel,
        classifier: Arc::new(classifier),
        rate_limiter: Arc::new(rate_limiter),
        cache: Arc::new(cache),
        fetch_tool: Arc::new(fetch_tool),
        queue_state,
        next_job_id: Arc::new(AtomicI64::new(1)),
        started_at: std::time::Instant::now(),
        api_listener: Arc::new(tokio::sync::Mutex::new(None)),
    }
}

/// Helper to create a test MediaDownloader with a NullChannel.
/// Returns the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_engine() -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let engine = build_test_engine(config, Arc::new(NullChannel::new())).await;
    (engine, temp_dir)
}

/// Same, but with a caller-supplied channel for delivery assertions.
pub(crate) async fn create_test_engine_with_channel(
    channel: Arc<dyn MessageChannel>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let engine = build_test_engine(config, channel).await;
    (engine, temp_dir)
}

/// Write an executable shell script standing in for the fetch tool.
///
/// The wrapper resolves the `-o` template into `$out` (with `mp4` for the
/// extension placeholder) before running `body`, so bodies can write the
/// artifact with `printf ... > "$out"`. Returns the script path for
/// `fetch_tool.binary_path`.
#[cfg(unix)]
pub(crate) fn install_fake_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-tool.sh");
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "template=\"\"\n",
            "prev=\"\"\n",
            "for arg in \"$@\"; do\n",
            "  if [ \"$prev\" = \"-o\" ]; then template=\"$arg\"; fi\n",
            "  prev=\"$arg\"\n",
            "done\n",
            "out=$(printf '%s' \"$template\" | sed 's/%(ext)s/mp4/')\n",
            "{body}\n"
        ),
        body = body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fake tool body that writes a small artifact and succeeds.
#[cfg(unix)]
pub(crate) const TOOL_SUCCEEDS: &str = "printf 'fake video data' > \"$out\"\nexit 0";

/// Fake tool body that fails with a classifiable stderr line.
#[cfg(unix)]
pub(crate) const TOOL_FAILS_FORBIDDEN: &str =
    "echo 'ERROR: HTTP Error 403: Forbidden' >&2\nexit 1";

/// Message channel that records every operation for assertions.
///
/// Failure injection flags make the delivery fallbacks reachable from tests
/// without a real transport.
#[derive(Default)]
pub(crate) struct RecordingChannel {
    /// (requester, reply_to, text) per send_text call
    pub(crate) sent_texts: Mutex<Vec<(RequesterId, i64, String)>>,
    /// (requester, reply_to, artifact path) per send_media call
    pub(crate) sent_media: Mutex<Vec<(RequesterId, i64, PathBuf)>>,
    /// (message_id, new text) per edit_text call
    pub(crate) edits: Mutex<Vec<(i64, String)>>,
    /// message_id per delete_message call
    pub(crate) deletions: Mutex<Vec<i64>>,
    next_message_id: AtomicI64,
    /// When true, send_media fails with SendFailed
    pub(crate) fail_media: AtomicBool,
    /// When true, send_text fails with SendFailed
    pub(crate) fail_text: AtomicBool,
    /// When true, edit_text fails with SendFailed
    pub(crate) fail_edits: AtomicBool,
}

impl RecordingChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Last text handed to the requester, whether sent fresh or edited in.
    pub(crate) fn last_text(&self) -> Option<String> {
        let edits = self.edits.lock().unwrap();
        if let Some((_, text)) = edits.last() {
            return Some(text.clone());
        }
        drop(edits);
        self.sent_texts
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, text)| text.clone())
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send_text(
        &self,
        requester: &RequesterId,
        reply_to: i64,
        text: &str,
    ) -> Result<MessageRef, ChannelError> {
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("injected text failure".to_string()));
        }
        self.sent_texts
            .lock()
            .unwrap()
            .push((requester.clone(), reply_to, text.to_string()));
        Ok(MessageRef {
            requester_id: requester.clone(),
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn send_media(
        &self,
        requester: &RequesterId,
        reply_to: i64,
        artifact: &Path,
        _caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed(
                "injected media failure".to_string(),
            ));
        }
        self.sent_media
            .lock()
            .unwrap()
            .push((requester.clone(), reply_to, artifact.to_path_buf()));
        Ok(())
    }

    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<(), ChannelError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("injected edit failure".to_string()));
        }
        self.edits
            .lock()
            .unwrap()
            .push((message.message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), ChannelError> {
        self.deletions.lock().unwrap().push(message.message_id);
        Ok(())
    }
}
