use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SqlTemplateError;

/// Per-call cancellation and deadline.
///
/// Every database await in an engine call is raced against both. When either fires the
/// pending database future is dropped, which aborts the statement it started, and the
/// call returns `Cancelled` or `DeadlineExceeded`.
///
/// ```rust
/// use std::time::Duration;
/// use sql_templates::prelude::*;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = QueryContext::with_timeout(Duration::from_secs(5)).with_cancellation(token.clone());
/// assert!(ctx.deadline().is_some());
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that never cancels on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tie this context to a caller-owned token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the context is already done.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` or `DeadlineExceeded`.
    pub fn check(&self) -> Result<(), SqlTemplateError> {
        if self.token.is_cancelled() {
            return Err(SqlTemplateError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SqlTemplateError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` unless the context fires first, in which case `fut` is dropped unfinished.
    pub(crate) async fn guard<F, T>(&self, fut: F) -> Result<T, SqlTemplateError>
    where
        F: Future<Output = Result<T, SqlTemplateError>>,
    {
        self.check()?;
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                tracing::debug!("query cancelled; abandoning statement");
                Err(SqlTemplateError::Cancelled)
            }
            () = expired => {
                tracing::debug!("query deadline exceeded; abandoning statement");
                Err(SqlTemplateError::DeadlineExceeded)
            }
            result = fut => result,
        }
    }
}
