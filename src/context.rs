//! Per-call deadline and cancellation.

use crate::error::{MongoError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal carried by every operation.
///
/// Clones share the cancellation token, so cancelling any clone aborts
/// every in-flight call that was given one.
///
/// # Example
///
/// ```ignore
/// let ctx = Context::with_timeout(Duration::from_secs(2));
/// db.ping(&ctx).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Context {
    /// A context that never expires and is only cancelled explicitly.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// Same cancellation token, with `timeout` applied when no deadline is set.
    pub fn or_timeout(&self, timeout: Option<Duration>) -> Self {
        let deadline = self
            .deadline
            .or_else(|| timeout.map(|t| Instant::now() + t));
        Self {
            deadline,
            token: self.token.clone(),
        }
    }

    /// Instant after which calls fail with `Timeout`.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes. The future is dropped in the latter two cases.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| MongoError::Timeout)?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(MongoError::Cancelled),
            res = bounded => res,
        }
    }
}
