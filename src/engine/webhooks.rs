//! Analytics webhook forwarding.

use crate::types::{Event, Outcome};

use super::MediaDownloader;

impl MediaDownloader {
    /// Forward a job outcome to the configured analytics webhook
    ///
    /// Sends an HTTP POST with the outcome serialized as JSON. The request is
    /// executed asynchronously (fire and forget) to keep the job pipeline
    /// from ever waiting on a collector; failures are logged and emitted as
    /// [`Event::AnalyticsWebhookFailed`], nothing more.
    pub(crate) fn forward_outcome_webhook(&self, outcome: &Outcome) {
        let Some(url) = self.config.analytics.webhook_url.clone() else {
            return;
        };

        let timeout = self.config.webhook_timeout();
        let event_tx = self.event_tx.clone();
        let payload = outcome.clone();

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let request = client.post(&url).json(&payload).timeout(timeout);

            // The reqwest timeout bounds the request itself; the outer one
            // also bounds connection setup.
            let failure = match tokio::time::timeout(timeout, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    tracing::debug!(url = %url, "analytics webhook delivered");
                    None
                }
                Ok(Ok(response)) => Some(format!(
                    "Analytics webhook returned status {}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                )),
                Ok(Err(e)) => Some(format!("Failed to send analytics webhook: {}", e)),
                Err(_) => Some(format!("Analytics webhook timed out after {:?}", timeout)),
            };

            if let Some(error) = failure {
                tracing::warn!(url = %url, error = %error, "analytics webhook failed");
                event_tx
                    .send(Event::AnalyticsWebhookFailed { url, error })
                    .ok();
            }
        });
    }
}
