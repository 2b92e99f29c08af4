use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use stream_api::StreamError;

/// Errors that know whether another attempt could succeed.
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

impl Retriable for StreamError {
    fn is_retriable(&self) -> bool {
        StreamError::is_retriable(self)
    }
}

/// How a retried operation ended. Exhaustion is a value: the call site
/// decides whether it matters.
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T, E> {
    Success(T),
    /// Every attempt failed with a retriable error.
    ExhaustedRetries { attempts: u32, last_error: E },
    /// Non-retriable error; no further attempts were made.
    Abandoned(E),
    /// The cancellation token fired before or during a backoff.
    Cancelled,
}

/// Fixed-delay bounded retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; zero is treated as one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `op` until it succeeds, fails with a non-retriable error, runs
    /// out of attempts, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. The backoff wait races the
    /// cancellation token, so a revoked shard stops retrying immediately.
    /// There is no wait after the last attempt.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        label: &str,
        mut op: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retriable + std::fmt::Debug,
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }

            let error = match op(attempt).await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => e,
            };

            if !error.is_retriable() {
                return RetryOutcome::Abandoned(error);
            }
            if attempt >= self.max_attempts {
                return RetryOutcome::ExhaustedRetries {
                    attempts: attempt,
                    last_error: error,
                };
            }

            tracing::warn!(
                %label,
                attempt,
                max_attempts = self.max_attempts,
                error = ?error,
                "attempt failed, backing off"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!(%label, attempt, "backoff interrupted");
                    return RetryOutcome::Cancelled;
                }
            }
            attempt += 1;
        }
    }
}
