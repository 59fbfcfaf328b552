//! Reconcile context - cancellation and deadline for a single pass

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Operation, ReconcileError};

/// Carried into every reconcile/finalize call by the scheduler
#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ReconcileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tie the pass to an externally owned token (e.g., process shutdown)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes when the pass is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// Run `fut` unless the pass is cancelled first. Dropping `fut` on
    /// cancellation does not undo any remote call it already issued.
    pub async fn guard<T, F>(
        &self,
        owner: &str,
        operation: Operation,
        fut: F,
    ) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, ReconcileError>>,
    {
        tokio::select! {
            biased;
            _ = self.done() => Err(ReconcileError::Cancelled {
                operation,
                owner: owner.to_string(),
            }),
            result = fut => result,
        }
    }
}
