//! Deadline and cancellation for a single allocation call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use indexpool_core::error::AppError;
use indexpool_core::result::AppResult;

/// Per-call deadline and cancellation signal.
///
/// The engine checks the context before every attempt and races each
/// attempt and each backoff sleep against it. When the context fires,
/// the in-flight attempt is dropped, which rolls back an engine-owned
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// A context with no deadline that is never cancelled unless its
    /// token is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast if the context has already fired.
    pub fn check(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::cancelled("Allocation cancelled by caller"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AppError::deadline_exceeded("Allocation deadline exceeded"));
        }
        Ok(())
    }

    /// Run `fut` unless the context fires first.
    pub async fn guard<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::cancelled("Allocation cancelled by caller")),
            _ = deadline => Err(AppError::deadline_exceeded("Allocation deadline exceeded")),
            res = fut => res,
        }
    }

    /// Sleep for `delay` unless the context fires first.
    pub async fn sleep(&self, delay: Duration) -> AppResult<()> {
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}
