//! Per-request cancellation and deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::DomainError;

/// Carries the caller's cancellation signal through every store and cache call.
///
/// Cloning shares the same signal, so cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            cancel: Arc::new(watch::Sender::new(false)),
            deadline: None,
        }
    }
}

impl RequestContext {
    /// A context that is never cancelled on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` unless the context is cancelled or its deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DomainError> {
        if self.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        let mut signal = self.cancel.subscribe();
        let cancelled = async move {
            // The sender lives in `self`, so the channel can't close while we wait.
            let _ = signal.wait_for(|cancelled| *cancelled).await;
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(DomainError::Cancelled),
            _ = expired => {
                tracing::debug!("Request deadline exceeded");
                Err(DomainError::Cancelled)
            }
            out = fut => Ok(out),
        }
    }
}
