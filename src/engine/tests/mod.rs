//! Engine behavior tests driven through the public surface, with fake fetch
//! tools and recording channels standing in for the real world.


use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::tempdir;

use super::test_helpers::*;
use super::MediaDownloader;
use crate::channel::NullChannel;
use crate::error::{Error, FetchFailureKind};
use crate::fingerprint::fingerprint;
use crate::types::*;

/// Poll `check` until it passes or `timeout` elapses.
pub(crate) async fn wait_until(check: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

/// Poll the analytics log until it holds `total` rows or `timeout` elapses.
pub(crate) async fn wait_for_outcomes(
    engine: &MediaDownloader,
    total: i64,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if matches!(engine.db.outcome_totals().await, Ok(t) if t.total == total) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Drain everything currently buffered on an event receiver.
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
