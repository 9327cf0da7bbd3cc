//! Caller-supplied deadlines and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Bounds how long an operation may run.
///
/// A context can carry a deadline, a cancellation token, both or neither.
/// The whole operation (every attempt and every backoff sleep) runs inside
/// the same context, so retries never extend the caller's time budget.
///
/// # Examples
///
/// ```
/// use account_management::Context;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = Context::with_timeout(Duration::from_secs(5)).cancelled_by(token.clone());
/// assert!(ctx.deadline().is_some());
///
/// // Elsewhere: abort the call early
/// token.cancel();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Context {
    /// A context that never expires.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: None,
        }
    }

    /// Adds a cancellation token to this context.
    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the deadline has passed or the token was cancelled.
    pub fn is_done(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
            || self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Drives `fut` to completion unless the context ends first, in which
    /// case `fut` is dropped and [`Error::DeadlineExceeded`] is returned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_done() {
            return Err(Error::DeadlineExceeded);
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Error::DeadlineExceeded),
            _ = expired => Err(Error::DeadlineExceeded),
            result = fut => result,
        }
    }
}
