//! Shutdown coordination.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Hands out child tokens that long-running tasks race against.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when this coordinator triggers.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Run `fut` until it finishes or `token` is cancelled.
///
/// Returns `None` on cancellation; the future is dropped at its current
/// suspension point.
pub async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_cancels_children() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());

        shutdown.trigger();
        assert!(token.is_cancelled());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_cancellable_completes() {
        let token = CancellationToken::new();
        assert_eq!(cancellable(&token, async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_interrupted() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });

        let result = cancellable(&token, tokio::time::sleep(Duration::from_secs(60))).await;
        assert!(result.is_none());
    }
}
