//! Shutdown orchestration: one cancellation token, one hard deadline.
//!
//! Termination signals (SIGINT/SIGTERM) are the only external shutdown
//! trigger. On signal the shared [`CancellationToken`] is cancelled and a
//! watchdog is armed: if graceful shutdown has not finished within the grace
//! window - a wedged stream read, a stuck HTTP call - the process is forced
//! out. The watchdog is the safety net for anything that fails to honor
//! cancellation promptly.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Owns the process-wide cancellation token and the exit watchdog.
#[derive(Debug)]
pub struct ShutdownOrchestrator {
    cancel: CancellationToken,
    grace: Duration,
}

impl ShutdownOrchestrator {
    /// Create an orchestrator with the given grace window.
    pub fn new(grace: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            grace,
        }
    }

    /// Clone of the shared cancellation token.
    ///
    /// Every component receives one at construction and selects on it at
    /// each blocking point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Grace window before the watchdog forces the process out.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Spawn the signal listener.
    ///
    /// On the first SIGINT or SIGTERM: broadcast cancellation and arm the
    /// hard-exit watchdog.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        let grace = self.grace;

        tokio::spawn(async move {
            if let Err(e) = wait_for_termination().await {
                error!(error = %e, "failed to listen for termination signals");
                return;
            }

            info!("received shutdown signal, initiating graceful shutdown");
            cancel.cancel();
            arm_watchdog(grace);
        })
    }

    /// Trigger shutdown without an external signal (for error paths).
    pub fn trigger(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            arm_watchdog(self.grace);
        }
    }
}

/// Force the process out after the grace window.
fn arm_watchdog(grace: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        error!(
            grace_secs = grace.as_secs(),
            "graceful shutdown deadline exceeded, forcing exit"
        );
        std::process::exit(1);
    });
}

/// Resolve on the first termination request.
async fn wait_for_termination() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_uncancelled() {
        let shutdown = ShutdownOrchestrator::new(Duration::from_secs(30));
        assert!(!shutdown.cancel_token().is_cancelled());
        assert_eq!(shutdown.grace(), Duration::from_secs(30));
    }

    #[test]
    fn token_clones_share_cancellation() {
        let shutdown = ShutdownOrchestrator::new(Duration::from_secs(30));
        let a = shutdown.cancel_token();
        let b = shutdown.cancel_token();

        a.cancel();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn trigger_cancels_the_token() {
        // Use a grace window far beyond the test's lifetime so the watchdog
        // never fires here.
        let shutdown = ShutdownOrchestrator::new(Duration::from_secs(3600));
        let token = shutdown.cancel_token();

        shutdown.trigger();
        assert!(token.is_cancelled());

        // Idempotent.
        shutdown.trigger();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_unblocks_waiters() {
        let shutdown = ShutdownOrchestrator::new(Duration::from_secs(3600));
        let token = shutdown.cancel_token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must unblock on cancellation")
            .unwrap();
    }
}
