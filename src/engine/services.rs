//! Background service starters and analytics recording.

use crate::sweeper;
use crate::types::Outcome;

use super::MediaDownloader;

impl MediaDownloader {
    /// Start the cleanup sweeper background task
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        if !self.config.cleanup.enabled {
            tracing::info!("Cleanup disabled, skipping sweeper");
            return tokio::spawn(async {});
        }

        let sweeper = sweeper::CleanupSweeper::new(self.clone());

        let handle = tokio::spawn(async move {
            sweeper.run().await;
        });

        tracing::info!(
            retention_hours = self.config.cleanup.retention_hours,
            sweep_interval_mins = self.config.cleanup.sweep_interval_mins,
            "Cleanup sweeper background task started"
        );

        handle
    }

    /// Record a job outcome in the analytics log and forward it to the webhook
    ///
    /// Analytics are best-effort observability: a failure here is logged and
    /// swallowed, never surfaced to the requester or the job.
    pub(crate) async fn record_outcome(&self, outcome: Outcome) {
        if let Err(e) = self.db.record_outcome(&outcome).await {
            tracing::warn!(
                requester_id = %outcome.requester_id,
                error = %e,
                "Failed to record outcome in analytics log"
            );
        }
        self.forward_outcome_webhook(&outcome);
    }
}
