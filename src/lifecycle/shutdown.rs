//! Shutdown coordination for the gateway.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

/// How a drain finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Everything finished within the grace period.
    Completed,
    /// The grace period ran out first.
    TimedOut,
}

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for `work` (usually the server task) for at most `grace`.
    pub async fn drain<F>(&self, work: F, grace: Duration) -> DrainOutcome
    where
        F: Future,
    {
        match tokio::time::timeout(grace, work).await {
            Ok(_) => {
                tracing::info!("All connections drained");
                DrainOutcome::Completed
            }
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, abandoning in-flight requests");
                DrainOutcome::TimedOut
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
