//! Queue processor: drains the FIFO queue and spawns fetch tasks.

use std::time::Duration;

use super::fetch_task::FetchTaskContext;
use super::MediaDownloader;

/// How long the processor sleeps between looks at an empty queue
const IDLE_POLL: Duration = Duration::from_millis(100);

impl MediaDownloader {
    /// Spawn the background task that drains the queue.
    ///
    /// The loop acquires a concurrency permit before popping, so a job only
    /// leaves the queue when a slot can actually run it; until then it stays
    /// visible in the pending count. Jobs start strictly in arrival order.
    /// The loop exits once shutdown clears `accepting_new`.
    pub fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let queue = self.queue_state.queue.clone();
        let concurrent_limit = self.queue_state.concurrent_limit.clone();
        let accepting_new = self.queue_state.accepting_new.clone();
        let engine = self.clone();

        tokio::spawn(async move {
            loop {
                // Stop handing out queued jobs once shutdown begins
                if !accepting_new.load(std::sync::atomic::Ordering::SeqCst) {
                    tracing::debug!("Queue processor stopping, no longer accepting jobs");
                    break;
                }

                // Wait for a slot first (blocks while at the concurrency limit)
                let permit = match concurrent_limit.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break, // Semaphore closed
                };

                let next_job = queue.lock().await.pop_front();

                match next_job {
                    Some(job) => {
                        let ctx = FetchTaskContext {
                            id: job.id,
                            request: job.request,
                            ack: job.ack,
                            engine: engine.clone(),
                        };

                        // The permit rides along and is released when the task finishes
                        tokio::spawn(async move {
                            let _permit = permit;
                            super::fetch_task::run_fetch_task(ctx).await;
                        });
                    }
                    None => {
                        // Queue is empty; give the slot back and wait a bit
                        drop(permit);
                        tokio::time::sleep(IDLE_POLL).await;
                    }
                }
            }
        })
    }
}
