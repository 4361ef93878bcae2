//! Interrupt handling.
//!
//! [`SigDown`] cancels a [`CancellationToken`] on SIGTERM or SIGINT. The
//! orchestrator watches that token during confirmation waits, so an interrupt
//! ends the command with the transaction reported as still pending instead of
//! killing the process mid-wait.

use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers.
    ///
    /// Returns an error if signal registration fails.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::warn!("SIGTERM received, no longer waiting for confirmations");
                },
                _ = sigint.recv() => {
                    tracing::warn!("Interrupted, no longer waiting for confirmations");
                },
                _ = inner.cancelled() => {},
            }
            inner.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Stops listening for signals and waits for the handler task to finish.
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        self.task_tracker.wait().await;
    }
}
