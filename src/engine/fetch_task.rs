//! Fetch task execution: per-job lifecycle from cache check through delivery.

use std::time::Duration;

use chrono::Utc;

use crate::channel::MessageRef;
use crate::error::{Error, FetchError, FetchFailureKind};
use crate::fetch_tool::{self, AttemptResult, ProgressThrottle};
use crate::fingerprint::fingerprint;
use crate::types::{CacheEntry, Event, FetchRequest, Fingerprint, JobId, Outcome};

use super::MediaDownloader;

/// Shared context for a single fetch task, reducing parameter passing between helpers.
pub(crate) struct FetchTaskContext {
    pub(crate) id: JobId,
    pub(crate) request: FetchRequest,
    /// The acknowledgment message sent at admission, edited with progress and results
    pub(crate) ack: Option<MessageRef>,
    pub(crate) engine: MediaDownloader,
}

impl FetchTaskContext {
    /// Remove this job from the active jobs map.
    pub(super) async fn remove_from_active(&self) {
        let mut active = self.engine.queue_state.active_jobs.lock().await;
        active.remove(&self.id);
    }

    /// Deliver the terminal notification for this job.
    ///
    /// Edits the acknowledgment message when one exists, otherwise (or when
    /// the edit is refused) sends a fresh reply. A channel that rejects both
    /// is logged; the job still ends.
    pub(super) async fn notify_terminal(&self, text: &str) {
        if let Some(ack) = &self.ack {
            match self.engine.channel.edit_text(ack, text).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(
                        job_id = self.id.0,
                        error = %e,
                        "Failed to edit status message, sending a fresh reply"
                    );
                }
            }
        }
        if let Err(e) = self
            .engine
            .channel
            .send_text(&self.request.requester_id, self.request.message_id, text)
            .await
        {
            tracing::error!(
                job_id = self.id.0,
                error = %e,
                "Could not deliver the final reply to the requester"
            );
        }
    }

    /// Build the analytics record for this job.
    pub(super) fn outcome(
        &self,
        success: bool,
        error_kind: Option<FetchFailureKind>,
        size_bytes: Option<u64>,
        duration_ms: u64,
        cache_hit: bool,
    ) -> Outcome {
        Outcome {
            requester_id: self.request.requester_id.clone(),
            url: self.request.source_url.clone(),
            fingerprint: fingerprint(&self.request.source_url),
            origin: self.request.origin,
            success,
            error_kind,
            size_bytes,
            duration_ms,
            cache_hit,
        }
    }
}

/// Terminal fetch failure with everything finalization needs.
struct FetchFailure {
    /// The underlying error, for logs
    error: Error,
    /// Classification for events and analytics
    kind: FetchFailureKind,
    /// Tool invocations actually made
    attempts: u32,
    /// What the requester is told
    user_text: String,
}

/// Core fetch task, orchestrating the full lifecycle of a single job.
///
/// Phases:
/// 1. Register in the active map and emit Started
/// 2. Check the artifact cache (a hit skips the tool entirely)
/// 3. Run the fetch tool with retry and backoff
/// 4. Deliver the artifact (or surface the failure) and record the outcome
pub(crate) async fn run_fetch_task(ctx: FetchTaskContext) {
    let id = ctx.id;
    let started = std::time::Instant::now();
    let fp = fingerprint(&ctx.request.source_url);

    // Phase 1: register as active
    {
        let mut active = ctx.engine.queue_state.active_jobs.lock().await;
        active.insert(id, fp.clone());
    }
    ctx.engine.emit_event(Event::Started { id });

    // Phase 2: cache check. A peer may have fetched the same URL while this
    // job sat in the queue, so the check runs here as well as at submission.
    if let Some(entry) = ctx.engine.cache.lookup(&fp).await {
        tracing::info!(job_id = id.0, fingerprint = %fp, "Serving job from artifact cache");
        ctx.engine.emit_event(Event::CacheHit {
            id,
            fingerprint: fp.clone(),
        });
        let duration_ms = elapsed_ms(started);
        ctx.engine.emit_event(Event::FetchSucceeded {
            id,
            size_bytes: entry.size_bytes,
            duration_ms,
            cache_hit: true,
        });
        super::delivery::deliver_and_record(&ctx, entry, true, started).await;
        ctx.remove_from_active().await;
        return;
    }

    // Phase 3: fetch with retry
    match fetch_with_retries(&ctx, &fp).await {
        Ok(entry) => {
            let duration_ms = elapsed_ms(started);
            ctx.engine.emit_event(Event::FetchSucceeded {
                id,
                size_bytes: entry.size_bytes,
                duration_ms,
                cache_hit: false,
            });
            super::delivery::deliver_and_record(&ctx, entry, false, started).await;
        }
        Err(failure) => {
            tracing::warn!(
                job_id = id.0,
                error = %failure.error,
                attempts = failure.attempts,
                "Job failed"
            );
            ctx.engine.emit_event(Event::FetchFailed {
                id,
                kind: failure.kind,
                attempts: failure.attempts,
            });
            ctx.notify_terminal(&failure.user_text).await;
            let outcome = ctx.outcome(
                false,
                Some(failure.kind),
                None,
                elapsed_ms(started),
                false,
            );
            ctx.engine.record_outcome(outcome).await;
        }
    }

    // Phase 4: done
    ctx.remove_from_active().await;
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Run the fetch tool until it produces an artifact or attempts are exhausted.
///
/// Nonzero tool exits retry with exponential backoff (2^attempt seconds,
/// capped by `retry.max_attempts` invocations total). A run that completes
/// but leaves no artifact behind fails immediately: retrying cannot heal a
/// tool that reports success without producing output. A subprocess that
/// cannot be spawned at all fails immediately for the same reason.
async fn fetch_with_retries(
    ctx: &FetchTaskContext,
    fp: &Fingerprint,
) -> std::result::Result<CacheEntry, FetchFailure> {
    let max_attempts = ctx.engine.config.retry.max_attempts;
    let mut last_kind = FetchFailureKind::Unknown;

    for attempt in 1..=max_attempts {
        // Every attempt writes under a fresh identifier so partial output of
        // an earlier attempt can never be mistaken for the artifact
        let artifact_id = fetch_tool::generate_artifact_id();
        let output_template = ctx
            .engine
            .config
            .storage_dir()
            .join(format!("{}.%(ext)s", artifact_id));

        let attempt_result = ctx
            .engine
            .fetch_tool
            .run(&ctx.request.source_url, &output_template, progress_reporter(ctx))
            .await;

        match attempt_result {
            Ok(AttemptResult::Completed) => {
                return locate_and_cache(ctx, fp, &artifact_id, attempt).await;
            }
            Ok(AttemptResult::Failed { kind, stderr }) => {
                last_kind = kind;
                tracing::warn!(
                    job_id = ctx.id.0,
                    attempt,
                    max_attempts,
                    kind = %kind,
                    stderr = %stderr.trim(),
                    "Fetch attempt failed"
                );
                if attempt < max_attempts {
                    let delay_secs = 2u64.pow(attempt);
                    ctx.engine.emit_event(Event::Retrying {
                        id: ctx.id,
                        attempt,
                        delay_secs,
                    });
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
            }
            Err(e) => {
                // The subprocess could not be driven at all, usually a missing
                // binary; further attempts would fail identically
                return Err(FetchFailure {
                    error: e,
                    kind: FetchFailureKind::Unknown,
                    attempts: attempt - 1,
                    user_text: "The download tool is unavailable on this server. \
                                Please contact the operator."
                        .to_string(),
                });
            }
        }
    }

    Err(FetchFailure {
        error: Error::Fetch(FetchError::Exhausted {
            kind: last_kind,
            attempts: max_attempts,
        }),
        kind: last_kind,
        attempts: max_attempts,
        user_text: last_kind.user_message().to_string(),
    })
}

/// Locate the artifact a completed run left behind and publish it to the cache.
async fn locate_and_cache(
    ctx: &FetchTaskContext,
    fp: &Fingerprint,
    artifact_id: &str,
    attempt: u32,
) -> std::result::Result<CacheEntry, FetchFailure> {
    let missing_text =
        "The download finished but the file could not be found. Please try again.";

    let artifact_path = match fetch_tool::find_artifact(
        ctx.engine.config.storage_dir(),
        artifact_id,
    )
    .await
    {
        Ok(Some(path)) => path,
        Ok(None) => {
            return Err(FetchFailure {
                error: Error::Fetch(FetchError::ArtifactMissing {
                    artifact_id: artifact_id.to_string(),
                }),
                kind: FetchFailureKind::Unknown,
                attempts: attempt,
                user_text: missing_text.to_string(),
            });
        }
        Err(e) => {
            return Err(FetchFailure {
                error: e,
                kind: FetchFailureKind::Unknown,
                attempts: attempt,
                user_text: missing_text.to_string(),
            });
        }
    };

    let size_bytes = match tokio::fs::metadata(&artifact_path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            return Err(FetchFailure {
                error: Error::Io(e),
                kind: FetchFailureKind::Unknown,
                attempts: attempt,
                user_text: missing_text.to_string(),
            });
        }
    };

    let entry = CacheEntry {
        fingerprint: fp.clone(),
        artifact_path,
        size_bytes,
        created_at: Utc::now(),
    };
    ctx.engine.cache.insert(entry.clone()).await;

    Ok(entry)
}

/// Build the per-attempt progress callback.
///
/// The callback runs on the subprocess output reader, so channel edits go
/// through short-lived tasks; the reader never waits on the transport.
fn progress_reporter(ctx: &FetchTaskContext) -> impl FnMut(f32) + Send {
    let mut throttle = ProgressThrottle::new();
    let engine = ctx.engine.clone();
    let ack = ctx.ack.clone();
    let id = ctx.id;

    move |percent: f32| {
        if !throttle.should_report(percent) {
            return;
        }
        engine.emit_event(Event::Progress { id, percent });
        if let Some(ack) = ack.clone() {
            let channel = engine.channel.clone();
            tokio::spawn(async move {
                let text = format!("Downloading... {:.0}%", percent);
                if let Err(e) = channel.edit_text(&ack, &text).await {
                    tracing::debug!(job_id = id.0, error = %e, "Failed to edit progress message");
                }
            });
        }
    }
}
