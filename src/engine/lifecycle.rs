//! Engine start, API server spawn, and graceful shutdown.

use crate::error::{Error, Result};
use crate::types::Event;

use super::MediaDownloader;

impl MediaDownloader {
    /// Start the engine's background tasks
    ///
    /// Launches the queue processor, the cleanup sweeper (when enabled),
    /// and the API server (when enabled; its listener was already bound in
    /// [`MediaDownloader::new`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the API server is enabled but its listener has
    /// already been handed out by an earlier `start` call.
    pub async fn start(&self) -> Result<()> {
        self.start_queue_processor();
        self.start_sweeper();

        if self.config.server.enabled {
            self.spawn_api_server().await?;
        }

        tracing::info!("Engine started");
        Ok(())
    }

    /// Spawn the REST API server in a background task
    ///
    /// The listener was bound during construction so a bad address fails
    /// early; this hands it to the router and emits `ApiServerStarted`.
    pub(crate) async fn spawn_api_server(&self) -> Result<tokio::task::JoinHandle<()>> {
        let listener = { self.api_listener.lock().await.take() };
        let Some(listener) = listener else {
            return Err(Error::ApiServerError(
                "API server already started".to_string(),
            ));
        };

        let addr = listener.local_addr().map_err(|e| {
            Error::ApiServerError(format!("Failed to read API server address: {}", e))
        })?;

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = crate::api::serve(engine, listener).await {
                tracing::error!(error = %e, "API server terminated");
            }
        });

        self.emit_event(Event::ApiServerStarted {
            addr: addr.to_string(),
        });
        tracing::info!(%addr, "API server listening");
        Ok(handle)
    }

    /// Drain the engine and stop.
    ///
    /// Admission closes first; the queue processor also stops handing
    /// queued jobs to slots once the flag flips. Active jobs then get up to
    /// `queue.shutdown_timeout_secs` to reach a terminal state. Stragglers
    /// are abandoned, not killed: their fetch subprocesses keep running
    /// unsupervised until the process exits. Queued jobs that never got a
    /// slot are dropped without notification.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down, draining active jobs");
        self.emit_event(Event::ShutdownStarted);

        self.queue_state
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Admission closed");

        let drain_window = self.config.shutdown_timeout();
        match tokio::time::timeout(drain_window, self.wait_for_active_jobs()).await {
            Ok(()) => {
                tracing::info!("All active jobs reached a terminal state");
            }
            Err(_) => {
                let stragglers = self.queue_state.active_jobs.lock().await.len();
                tracing::warn!(
                    stragglers,
                    "Drain window expired; remaining fetch processes keep running unsupervised"
                );
            }
        }

        // Anything still queued never started and is dropped with the process
        let abandoned = self.queue_state.queue.lock().await.len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "Abandoning queued jobs that never started");
        }

        self.emit_event(Event::Shutdown);

        // Database connections close when the last engine clone is dropped
        tracing::info!("Shutdown complete");
    }

    /// Poll the active map until the last job deregisters itself.
    async fn wait_for_active_jobs(&self) {
        loop {
            let active = self.queue_state.active_jobs.lock().await.len();
            if active == 0 {
                return;
            }

            tracing::debug!(active, "Waiting for active jobs to finish");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
