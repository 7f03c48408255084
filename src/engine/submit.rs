//! Inbound message handling: link classification, admission, and queueing.

use chrono::Utc;

use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;
use crate::types::{Event, FetchRequest, JobId, RequesterId};

use super::fetch_task::{run_fetch_task, FetchTaskContext};
use super::{MediaDownloader, QueuedJob};

/// Status text sent as soon as a link is accepted. Edited later with
/// progress updates and finally the terminal result.
const ACK_TEXT: &str = "Downloading your video... please wait.";

impl MediaDownloader {
    /// Handle an inbound message from a requester
    ///
    /// Scans the text for a supported media link; messages without one are
    /// ignored. An accepted link is acknowledged immediately and either served
    /// straight from the artifact cache or placed at the tail of the fetch
    /// queue.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the message contains no supported link, otherwise the
    /// `JobId` assigned to the accepted job.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is shutting down and no longer admits jobs
    /// - The requester is inside their rate-limit window
    ///
    /// In both cases the requester has already been told directly; callers
    /// should not retry on their behalf.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::channel::NullChannel;
    /// use media_dl::types::RequesterId;
    /// use media_dl::{Config, MediaDownloader};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader =
    ///         MediaDownloader::new(Config::default(), Arc::new(NullChannel::new())).await?;
    ///
    ///     let outcome = downloader
    ///         .handle_message(
    ///             "check this out https://youtu.be/dQw4w9WgXcQ",
    ///             RequesterId::new("chat-42"),
    ///             7,
    ///         )
    ///         .await?;
    ///
    ///     if let Some(id) = outcome {
    ///         println!("accepted as job {}", id);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn handle_message(
        &self,
        text: &str,
        requester_id: RequesterId,
        message_id: i64,
    ) -> Result<Option<JobId>> {
        // Messages without a recognizable media link are silently ignored
        let Some((url, origin)) = self.classifier.classify(text) else {
            return Ok(None);
        };

        // Check if accepting new jobs (reject during shutdown)
        if !self
            .queue_state
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            self.reply_best_effort(
                &requester_id,
                message_id,
                "The downloader is shutting down and cannot take new requests right now.",
            )
            .await;
            return Err(Error::ShuttingDown);
        }

        // Per-requester admission gate
        if let Some(wait_secs) = self.rate_limiter.admit(&requester_id).await {
            self.emit_event(Event::RateLimited {
                requester_id: requester_id.clone(),
                wait_secs,
            });
            let reply = format!(
                "You're sending links too quickly. Please wait {} seconds and try again.",
                wait_secs
            );
            self.reply_best_effort(&requester_id, message_id, &reply).await;
            return Err(Error::RateLimited { wait_secs });
        }

        let id = self.allocate_job_id();
        let request = FetchRequest {
            source_url: url.clone(),
            requester_id: requester_id.clone(),
            origin,
            message_id,
            submitted_at: Utc::now(),
        };

        // Losing the ack is not fatal: terminal notifications fall back to a
        // fresh message when there is nothing to edit
        let ack = match self.channel.send_text(&requester_id, message_id, ACK_TEXT).await {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(job_id = id.0, error = %e, "Failed to send acknowledgment message");
                None
            }
        };

        // A cached artifact skips the queue entirely: the job starts right
        // away without taking a concurrency slot
        let fp = fingerprint(&url);
        if self.cache.lookup(&fp).await.is_some() {
            tracing::debug!(job_id = id.0, fingerprint = %fp, "Cache hit at submission, bypassing queue");
            let ctx = FetchTaskContext {
                id,
                request,
                ack,
                engine: self.clone(),
            };
            tokio::spawn(async move {
                run_fetch_task(ctx).await;
            });
            return Ok(Some(id));
        }

        // Enqueue at the tail (strict FIFO)
        {
            let mut queue = self.queue_state.queue.lock().await;
            queue.push_back(QueuedJob { id, request, ack });
        }

        self.emit_event(Event::Queued { id, url, origin });
        tracing::info!(job_id = id.0, origin = %origin, "Job queued");

        Ok(Some(id))
    }

    /// Send a reply without failing the caller when the channel rejects it
    pub(crate) async fn reply_best_effort(
        &self,
        requester_id: &RequesterId,
        message_id: i64,
        text: &str,
    ) {
        if let Err(e) = self.channel.send_text(requester_id, message_id, text).await {
            tracing::warn!(requester_id = %requester_id, error = %e, "Failed to send reply");
        }
    }
}
