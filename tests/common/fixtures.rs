//! Fake fetch tools and a recording channel for end-to-end assertions

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use media_dl::channel::{ChannelError, MessageChannel, MessageRef};
use media_dl::types::RequesterId;

/// Write an executable shell script standing in for the fetch tool.
///
/// The wrapper resolves the `-o` template into `$out` (with `mp4` for the
/// extension placeholder) before running `body`, so bodies can write the
/// artifact with `printf ... > "$out"`. Returns the script path for
/// `fetch_tool.binary_path`.
#[cfg(unix)]
pub fn install_fake_tool(dir: &Path, body: &str) -> PathBuf {
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
pub const TOOL_SUCCEEDS: &str = "printf 'fake video data' > \"$out\"\nexit 0";

/// Like [`TOOL_SUCCEEDS`], but also appends a line to `runs` next to the
/// script on every real fetch, so tests can count subprocess invocations.
/// The version probe passes no `-o` template and is not counted.
pub const TOOL_COUNTS_RUNS: &str = concat!(
    "if [ -n \"$out\" ]; then echo run >> \"$(dirname \"$0\")/runs\"; fi\n",
    "printf 'fake video data' > \"$out\"\n",
    "exit 0"
);

/// Fake tool body that fails with a classifiable stderr line.
pub const TOOL_FAILS_FORBIDDEN: &str = "echo 'ERROR: HTTP Error 403: Forbidden' >&2\nexit 1";

/// Message channel that records every operation for assertions.
#[derive(Default)]
pub struct RecordingChannel {
    /// (requester, reply_to, text) per send_text call
    pub sent_texts: Mutex<Vec<(RequesterId, i64, String)>>,
    /// (requester, reply_to, artifact path) per send_media call
    pub sent_media: Mutex<Vec<(RequesterId, i64, PathBuf)>>,
    /// (message_id, new text) per edit_text call
    pub edits: Mutex<Vec<(i64, String)>>,
    /// message_id per delete_message call
    pub deletions: Mutex<Vec<i64>>,
    next_message_id: AtomicI64,
}

impl RecordingChannel {
    /// Last text handed to the requester, whether sent fresh or edited in.
    pub fn last_text(&self) -> Option<String> {
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
        self.sent_media
            .lock()
            .unwrap()
            .push((requester.clone(), reply_to, artifact.to_path_buf()));
        Ok(())
    }

    async fn edit_text(&self, message: &MessageRef, text: &str) -> Result<(), ChannelError> {
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
