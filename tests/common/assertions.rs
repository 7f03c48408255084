//! Shared wait helpers for end-to-end tests

use std::time::Duration;

use media_dl::{Event, JobId, MediaDownloader};

/// Result of waiting for a job to reach a terminal state
#[derive(Debug)]
pub enum WaitResult {
    /// The fetch succeeded and delivery was attempted
    Succeeded,
    /// The fetch failed terminally
    Failed,
    /// Timeout waiting for a terminal event
    Timeout,
    /// Event channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a job to reach a terminal state via the event stream
///
/// The receiver must have been subscribed before the job was submitted,
/// otherwise a fast job can finish before the first `recv`.
pub async fn wait_for_terminal(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::FetchSucceeded { id: event_id, .. }) if event_id == id => {
                    return WaitResult::Succeeded;
                }
                Ok(Event::FetchFailed { id: event_id, .. }) if event_id == id => {
                    return WaitResult::Failed;
                }
                Ok(_) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait until the analytics log holds `total` rows
///
/// The outcome row is written after delivery settles, so this doubles as a
/// "delivery finished" barrier for assertions on the recording channel.
pub async fn wait_for_outcome_total(
    engine: &MediaDownloader,
    total: i64,
    timeout: Duration,
) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if let Ok(totals) = engine.db.outcome_totals().await {
            if totals.total == total {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
