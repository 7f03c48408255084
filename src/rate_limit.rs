//! Per-requester admission throttling
//!
//! Enforces a minimum interval between accepted requests from the same
//! requester. In-memory and single-process; state does not survive a
//! restart, which is acceptable for an abuse throttle.

use crate::config::RateLimitConfig;
use crate::types::RequesterId;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Admission gate tracking each requester's last accepted request
///
/// Memory is bounded opportunistically: when the table outgrows the
/// configured threshold, an admission call first drops requesters idle
/// longer than the inactivity horizon. Best-effort only; not a correctness
/// requirement.
pub struct RateLimiter {
    last_accepted: Mutex<HashMap<RequesterId, Instant>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            last_accepted: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Gate one request from `requester`
    ///
    /// Returns `None` when the request is admitted, recording the
    /// requester's timestamp. Returns `Some(wait_secs)` with the remaining
    /// wait rounded up to whole seconds when the minimum interval has not
    /// elapsed; a denial leaves the stored timestamp untouched, so the wait
    /// shrinks as real time passes instead of resetting on every retry.
    pub async fn admit(&self, requester: &RequesterId) -> Option<u64> {
        let now = Instant::now();
        let min_interval = Duration::from_secs(self.config.min_interval_secs);

        let mut table = self.last_accepted.lock().await;

        if table.len() > self.config.gc_threshold {
            let horizon = Duration::from_secs(self.config.inactivity_horizon_secs);
            let before = table.len();
            table.retain(|_, last| now.duration_since(*last) <= horizon);
            debug!(
                removed = before - table.len(),
                remaining = table.len(),
                "rate limiter cleanup pass"
            );
        }

        match table.get(requester) {
            Some(last) => {
                let elapsed = now.duration_since(*last);
                if elapsed >= min_interval {
                    table.insert(requester.clone(), now);
                    None
                } else {
                    let remaining = min_interval - elapsed;
                    Some(remaining.as_secs_f64().ceil() as u64)
                }
            }
            None => {
                table.insert(requester.clone(), now);
                None
            }
        }
    }

    /// Number of requesters currently tracked
    pub async fn tracked(&self) -> usize {
        self.last_accepted.lock().await.len()
    }
}
