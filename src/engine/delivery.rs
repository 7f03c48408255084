//! Delivery policy: in-band transfer with link fallback.

use std::time::Instant;

use crate::error::DeliveryError;
use crate::types::{CacheEntry, DeliveryMode, Event};

use super::fetch_task::FetchTaskContext;

/// Deliver a fetched (or cached) artifact and record the job outcome.
pub(super) async fn deliver_and_record(
    ctx: &FetchTaskContext,
    entry: CacheEntry,
    cache_hit: bool,
    started: Instant,
) {
    match deliver_artifact(ctx, &entry).await {
        Ok(mode) => {
            tracing::info!(
                job_id = ctx.id.0,
                mode = mode.as_str(),
                size_bytes = entry.size_bytes,
                "Artifact delivered"
            );
            ctx.engine.emit_event(Event::Delivered { id: ctx.id, mode });
            let outcome = ctx.outcome(
                true,
                None,
                Some(entry.size_bytes),
                started.elapsed().as_millis() as u64,
                cache_hit,
            );
            ctx.engine.record_outcome(outcome).await;
        }
        Err(e) => {
            tracing::warn!(job_id = ctx.id.0, error = %e, "Delivery failed");
            ctx.engine.emit_event(Event::DeliveryFailed {
                id: ctx.id,
                error: e.to_string(),
            });
            ctx.notify_terminal(&e.user_message()).await;
            let outcome = ctx.outcome(
                false,
                None,
                Some(entry.size_bytes),
                started.elapsed().as_millis() as u64,
                cache_hit,
            );
            ctx.engine.record_outcome(outcome).await;
        }
    }
}

/// Try the in-band transfer, then the link fallback.
///
/// An in-band success deletes the artifact and its cache entry right away;
/// the channel holds a copy now, so ours would only burn disk until the
/// sweep. A link delivery keeps the artifact, since the link is only good
/// for as long as the file stays in storage.
async fn deliver_artifact(
    ctx: &FetchTaskContext,
    entry: &CacheEntry,
) -> std::result::Result<DeliveryMode, DeliveryError> {
    let limit_bytes = ctx.engine.config.delivery.inband_size_limit_bytes;
    let mut send_failure: Option<String> = None;

    if entry.size_bytes <= limit_bytes {
        let sent = ctx
            .engine
            .channel
            .send_media(
                &ctx.request.requester_id,
                ctx.request.message_id,
                &entry.artifact_path,
                None,
            )
            .await;
        match sent {
            Ok(()) => {
                // The ack is now redundant noise above the media message
                if let Some(ack) = &ctx.ack {
                    if let Err(e) = ctx.engine.channel.delete_message(ack).await {
                        tracing::debug!(
                            job_id = ctx.id.0,
                            error = %e,
                            "Failed to delete status message"
                        );
                    }
                }
                discard_delivered_artifact(ctx, entry).await;
                return Ok(DeliveryMode::InBand);
            }
            Err(e) => {
                tracing::warn!(
                    job_id = ctx.id.0,
                    error = %e,
                    "In-band transfer failed, trying link fallback"
                );
                send_failure = Some(e.to_string());
            }
        }
    }

    match public_link(ctx, entry) {
        Some(link) => {
            let retention_hours = ctx.engine.config.cleanup.retention_hours;
            let text = format!(
                "Your video is ready. Download it here: {}\nThe link stays valid for about {} hours.",
                link, retention_hours
            );
            ctx.notify_terminal(&text).await;
            Ok(DeliveryMode::Link)
        }
        None => Err(match send_failure {
            Some(reason) => DeliveryError::SendFailedNoFallback { reason },
            None => DeliveryError::TooLargeNoFallback {
                size_bytes: entry.size_bytes,
                limit_bytes,
            },
        }),
    }
}

/// Build the public artifact link, if a base address is configured.
fn public_link(ctx: &FetchTaskContext, entry: &CacheEntry) -> Option<String> {
    let base = ctx.engine.config.delivery.public_base_url.as_deref()?;
    let name = entry.artifact_path.file_name()?.to_str()?;
    Some(format!(
        "{}/artifacts/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(name)
    ))
}

/// Remove a successfully transferred artifact from disk and the cache.
async fn discard_delivered_artifact(ctx: &FetchTaskContext, entry: &CacheEntry) {
    if let Err(e) = tokio::fs::remove_file(&entry.artifact_path).await {
        tracing::warn!(
            job_id = ctx.id.0,
            path = %entry.artifact_path.display(),
            error = %e,
            "Failed to delete delivered artifact"
        );
    }
    ctx.engine
        .cache
        .remove_by_artifact_path(&entry.artifact_path)
        .await;
}
